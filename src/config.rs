// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{k3s, labels};
use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Token agents use to join the cluster
    pub join_token: String,
    /// True when no token was configured and the legacy literal is in use
    pub using_legacy_token: bool,
    /// ssh client binary
    pub ssh_program: PathBuf,
    /// Upper bound for a single remote operation
    pub ssh_timeout: Duration,
    /// ssh ConnectTimeout
    pub ssh_connect_timeout: Duration,
    /// ssh StrictHostKeyChecking value
    pub ssh_strict_host_key_checking: String,
    /// Directory for invocation-scoped private key files
    pub key_dir: PathBuf,
    /// Label selector for the control-plane node
    pub control_plane_selector: String,
    /// Requeue delay while an Agent's credential Secret is missing
    pub credential_retry: Duration,
    /// Requeue delay after a failed reconciliation
    pub error_requeue: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (join_token, using_legacy_token) = match lookup("K3AO_JOIN_TOKEN") {
            Some(token) if token.trim().is_empty() => bail!("K3AO_JOIN_TOKEN is set but empty"),
            Some(token) => (token, false),
            None => (k3s::LEGACY_JOIN_TOKEN.to_string(), true),
        };

        let key_dir = lookup("K3AO_KEY_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir);

        Ok(Config {
            join_token,
            using_legacy_token,
            ssh_program: lookup("K3AO_SSH_BINARY")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("ssh")),
            ssh_timeout: Duration::from_secs(parse_or(&lookup, "K3AO_SSH_TIMEOUT_SECS", 600)?),
            ssh_connect_timeout: Duration::from_secs(parse_or(
                &lookup,
                "K3AO_SSH_CONNECT_TIMEOUT_SECS",
                15,
            )?),
            ssh_strict_host_key_checking: lookup("K3AO_SSH_STRICT_HOST_KEY_CHECKING")
                .unwrap_or_else(|| "accept-new".to_string()),
            key_dir,
            control_plane_selector: lookup("K3AO_CONTROL_PLANE_SELECTOR")
                .unwrap_or_else(|| labels::CONTROL_PLANE_SELECTOR.to_string()),
            credential_retry: Duration::from_secs(parse_or(
                &lookup,
                "K3AO_CREDENTIAL_RETRY_SECS",
                30,
            )?),
            error_requeue: Duration::from_secs(parse_or(&lookup, "K3AO_ERROR_REQUEUE_SECS", 60)?),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, value)),
        None => Ok(default),
    }
}
