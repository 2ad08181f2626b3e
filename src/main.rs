// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use std::sync::Arc;
use tracing::{info, warn};

use k3ao::config::Config;
use k3ao::constants::OPERATOR_NAME;
use k3ao::kubernetes::wait_for_crds;
use k3ao::provisioning::SshExecutor;
use k3ao::reconcilers::{AgentReconciler, SshCredentialReconciler};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting {} operator", OPERATOR_NAME);

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: key_dir={}, ssh_timeout={:?}, control_plane_selector={}",
        config.key_dir.display(),
        config.ssh_timeout,
        config.control_plane_selector
    );
    if config.using_legacy_token {
        warn!("K3AO_JOIN_TOKEN not set, agents join with the built-in shared token");
    }

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    // Wait for the k3ao CRDs before starting reconcilers
    info!("Waiting for k3ao CRDs to become available...");
    wait_for_crds(&client).await?;

    let executor = Arc::new(SshExecutor::new(&config));
    let credential_reconciler = SshCredentialReconciler::new(client.clone());
    let agent_reconciler = AgentReconciler::new(client, config, executor);

    info!("Starting reconcilers...");

    // Run both reconcilers concurrently
    tokio::try_join!(credential_reconciler.run(), agent_reconciler.run())?;

    // This should never be reached as reconcilers run forever
    warn!("All reconcilers stopped unexpectedly");
    Ok(())
}
