// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Credential resolution: Secret -> username + scoped private key file

use crate::constants::secret_keys;
use crate::error::{K3aoError, Result};
use crate::provisioning::remote::is_safe_ssh_word;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::fs::Permissions;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, instrument};

/// Decoded SSH identity for a single reconciliation.
///
/// The private key lives in a uniquely named, owner-read-only file that is
/// removed when the handle is dropped, on success and error paths alike.
#[derive(Debug)]
pub struct CredentialHandle {
    username: String,
    key_file: TempPath,
}

impl CredentialHandle {
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn key_path(&self) -> &Path {
        &self.key_file
    }
}

/// Fetch the credential Secret and materialize its key into `key_dir`
#[instrument(skip(client, key_dir))]
pub async fn resolve_credential(
    client: &Client,
    namespace: &str,
    secret_name: &str,
    key_dir: &Path,
) -> Result<CredentialHandle> {
    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);

    let secret = match secrets.get(secret_name).await {
        Ok(secret) => secret,
        Err(kube::Error::Api(err)) if err.code == 404 => {
            return Err(K3aoError::CredentialNotFound {
                namespace: namespace.to_string(),
                name: secret_name.to_string(),
            });
        }
        Err(e) => {
            return Err(K3aoError::CredentialAccess {
                namespace: namespace.to_string(),
                name: secret_name.to_string(),
                source: e,
            });
        }
    };

    let username = decode_field(&secret, secret_keys::USERNAME)?.trim().to_string();
    if !is_safe_ssh_word(&username) {
        return Err(K3aoError::InvalidCredential(format!(
            "username '{}' in secret {} is not a valid ssh login name",
            username, secret_name
        )));
    }
    let key_contents = decode_field(&secret, secret_keys::SSH_KEY_CONTENTS)?;
    let key_file = materialize_key(key_dir, &key_contents)?;

    debug!(
        "Resolved credential {}/{} into {}",
        namespace,
        secret_name,
        key_file.display()
    );

    Ok(CredentialHandle { username, key_file })
}

/// Read a Secret field. The API server's base64 has already been undone by
/// deserialization, so this only checks presence and UTF-8.
fn decode_field(secret: &Secret, key: &str) -> Result<String> {
    let secret_name = secret.metadata.name.as_deref().unwrap_or_default();

    let Some(value) = secret.data.as_ref().and_then(|d| d.get(key)) else {
        return Err(K3aoError::InvalidCredential(format!(
            "secret {} does not contain '{}' key",
            secret_name, key
        )));
    };

    let decoded = String::from_utf8(value.0.clone()).map_err(|e| {
        K3aoError::InvalidCredential(format!(
            "'{}' in secret {} is not valid UTF-8: {}",
            key, secret_name, e
        ))
    })?;

    if decoded.trim().is_empty() {
        return Err(K3aoError::InvalidCredential(format!(
            "'{}' in secret {} is empty",
            key, secret_name
        )));
    }

    Ok(decoded)
}

/// Write the key to a fresh file created with mode 0400, so no other
/// principal can ever read it. ssh rejects keys without a final newline.
fn materialize_key(key_dir: &Path, contents: &str) -> Result<TempPath> {
    let mut file = create_key_file(key_dir)?;

    file.write_all(contents.as_bytes())
        .map_err(K3aoError::KeyFile)?;
    if !contents.ends_with('\n') {
        file.write_all(b"\n").map_err(K3aoError::KeyFile)?;
    }
    file.as_file().sync_all().map_err(K3aoError::KeyFile)?;

    Ok(file.into_temp_path())
}

fn create_key_file(key_dir: &Path) -> Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix("k3ao-key-")
        .permissions(Permissions::from_mode(0o400))
        .tempfile_in(key_dir)
        .map_err(K3aoError::KeyFile)
}
