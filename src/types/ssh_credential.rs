// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// SSH identity declared by a user and mirrored once into a Secret of the
/// same name, which Agents reference by `sshKeySecretName`.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[kube(
    group = "k3ao.devinyoung.io",
    version = "v1alpha1",
    kind = "SSHCredential",
    plural = "sshcredentials"
)]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct SshCredentialSpec {
    pub username: String,
    /// Private key in OpenSSH/PEM text form
    pub ssh_key_contents: String,
}

pub type SshCredential = SSHCredential;
