// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! SSHCredential reconciler - mirrors each credential once into a Secret.

use crate::constants::secret_keys;
use crate::error::{K3aoError, Result};
use crate::types::SshCredential;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    api::{ObjectMeta, PostParams},
    runtime::{controller::Action, Controller},
    Api, Client, ResourceExt,
};
use kube_runtime::watcher::Config as WatcherConfig;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

pub struct SshCredentialReconciler {
    client: Client,
}

impl SshCredentialReconciler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let credentials: Api<SshCredential> = Api::all(self.client.clone());
        let context = Arc::new(self);

        Controller::new(credentials, WatcherConfig::default())
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled sshcredential: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

async fn reconcile(credential: Arc<SshCredential>, ctx: Arc<SshCredentialReconciler>) -> Result<Action> {
    ensure_credential_secret(&ctx.client, &credential).await?;
    Ok(Action::await_change())
}

fn error_policy(
    credential: Arc<SshCredential>,
    error: &K3aoError,
    _ctx: Arc<SshCredentialReconciler>,
) -> Action {
    error!(
        "Failed to mirror sshcredential {}/{}: {}",
        credential.namespace().unwrap_or_default(),
        credential.name_any(),
        error
    );
    Action::requeue(Duration::from_secs(60))
}

/// Create the Secret backing an SSHCredential if it does not exist yet.
/// An existing Secret is left untouched.
#[instrument(skip(client, credential), fields(credential = %credential.name_any()))]
pub async fn ensure_credential_secret(client: &Client, credential: &SshCredential) -> Result<()> {
    let namespace = credential.namespace().unwrap_or_default();
    let name = credential.name_any();
    let secrets: Api<Secret> = Api::namespaced(client.clone(), &namespace);

    match secrets.get(&name).await {
        Ok(_) => {
            debug!("Secret {}/{} already exists", namespace, name);
            Ok(())
        }
        Err(kube::Error::Api(err)) if err.code == 404 => {
            info!("Creating secret {}/{} for sshcredential", namespace, name);
            match secrets
                .create(&PostParams::default(), &credential_secret(credential))
                .await
            {
                Ok(_) => Ok(()),
                Err(kube::Error::Api(err)) if err.code == 409 => {
                    debug!("Secret {}/{} was created concurrently", namespace, name);
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}

fn credential_secret(credential: &SshCredential) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(credential.name_any()),
            namespace: credential.namespace(),
            ..Default::default()
        },
        string_data: Some(BTreeMap::from([
            (
                secret_keys::USERNAME.to_string(),
                credential.spec.username.clone(),
            ),
            (
                secret_keys::SSH_KEY_CONTENTS.to_string(),
                credential.spec.ssh_key_contents.clone(),
            ),
        ])),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    }
}
