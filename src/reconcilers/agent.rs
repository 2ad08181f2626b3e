// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Agent reconciler - installs the k3s agent on create/resume/update and
//! removes it again when the Agent is deleted.

use crate::config::Config;
use crate::constants::AGENT_FINALIZER;
use crate::error::{ErrorClass, K3aoError, Result};
use crate::kubernetes::{find_control_plane, resolve_credential};
use crate::provisioning::{
    control_plane_url, install_agent, uninstall_agent, ConfigRenderer, RemoteExecutor,
    RemoteTarget, UninstallOutcome,
};
use crate::types::Agent;
use chrono::{SecondsFormat, Utc};
use futures::StreamExt;
use kube::{
    api::{Patch, PatchParams},
    runtime::{
        controller::Action,
        finalizer::{finalizer, Event as FinalizerEvent},
        watcher, Controller,
    },
    Api, Client, ResourceExt,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, instrument, warn};

pub struct AgentReconciler {
    client: Client,
    config: Config,
    executor: Arc<dyn RemoteExecutor>,
    renderer: ConfigRenderer,
    /// Outcome of the last apply per Agent, keyed by qualified name
    applied: Mutex<HashMap<String, AppliedState>>,
}

/// The resourceVersion our own status patch produced, and the action that
/// apply returned alongside it.
struct AppliedState {
    resource_version: String,
    action: Action,
}

impl AgentReconciler {
    pub fn new(client: Client, config: Config, executor: Arc<dyn RemoteExecutor>) -> Self {
        let renderer = ConfigRenderer::new(config.join_token.clone());
        Self {
            client,
            config,
            executor,
            renderer,
            applied: Mutex::new(HashMap::new()),
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let agents: Api<Agent> = Api::all(self.client.clone());
        let context = Arc::new(self);

        Controller::new(agents, watcher::Config::default())
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled agent: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }

    /// Bring the host to the installed state. Re-entrant: every call re-runs
    /// the whole idempotent sequence.
    #[instrument(skip(self, agent), fields(agent = %agent.qualified_name()))]
    pub async fn apply(&self, agent: &Agent) -> Result<Action> {
        if let Some(action) = self.own_status_update(agent) {
            debug!("Agent only changed by our own status update, not reinstalling");
            return Ok(action);
        }

        let outcome = self.install(agent).await;
        let resource_version = self.report_status(agent, &outcome).await;

        let result = match outcome {
            Ok(_) => {
                info!("k3s agent installed on {}", agent.spec.address);
                Ok(Action::await_change())
            }
            Err(e) if e.is_not_yet_ready() => {
                info!("{}, waiting for the SSHCredential to sync", e);
                Ok(Action::requeue(self.config.credential_retry))
            }
            Err(e) => Err(e),
        };

        let action = match &result {
            Ok(action) => action.clone(),
            Err(_) => Action::requeue(self.config.error_requeue),
        };
        self.remember(agent, resource_version, action);

        result
    }

    /// The watch delivers our own status patch as a new event. Answer it
    /// with the previous action instead of re-running the install, which
    /// would also reset the error requeue.
    fn own_status_update(&self, agent: &Agent) -> Option<Action> {
        let current = agent.resource_version()?;
        let applied = self.applied.lock().unwrap_or_else(PoisonError::into_inner);
        applied
            .get(&agent.qualified_name())
            .filter(|state| state.resource_version == current)
            .map(|state| state.action.clone())
    }

    fn remember(&self, agent: &Agent, resource_version: Option<String>, action: Action) {
        let mut applied = self.applied.lock().unwrap_or_else(PoisonError::into_inner);
        match resource_version {
            Some(resource_version) => {
                applied.insert(
                    agent.qualified_name(),
                    AppliedState {
                        resource_version,
                        action,
                    },
                );
            }
            None => {
                applied.remove(&agent.qualified_name());
            }
        }
    }

    /// Returns the control-plane address the agent joined.
    async fn install(&self, agent: &Agent) -> Result<String> {
        let namespace = agent.namespace().unwrap_or_default();

        if let Some(previous) = agent
            .status
            .as_ref()
            .and_then(|s| s.installed_address.as_deref())
            .filter(|previous| *previous != agent.spec.address)
        {
            warn!(
                "Agent address changed from {} to {}; the k3s agent on {} is left in place",
                previous, agent.spec.address, previous
            );
        }

        let credential = resolve_credential(
            &self.client,
            &namespace,
            &agent.spec.ssh_key_secret_name,
            &self.config.key_dir,
        )
        .await?;

        let control_plane =
            find_control_plane(&self.client, &self.config.control_plane_selector).await?;
        let server_url = control_plane_url(&control_plane)?;
        let document = self.renderer.render(&agent.spec.address)?;

        let target = RemoteTarget::new(&agent.spec.address, agent.spec.port, &credential)?;
        install_agent(
            self.executor.as_ref(),
            &target,
            &document,
            self.renderer.join_token(),
            &server_url,
        )
        .await?;

        Ok(control_plane)
    }

    /// Remove the k3s agent from the host before the Agent goes away
    #[instrument(skip(self, agent), fields(agent = %agent.qualified_name()))]
    pub async fn cleanup(&self, agent: &Agent) -> Result<Action> {
        let namespace = agent.namespace().unwrap_or_default();
        self.remember(agent, None, Action::await_change());

        let credential = match resolve_credential(
            &self.client,
            &namespace,
            &agent.spec.ssh_key_secret_name,
            &self.config.key_dir,
        )
        .await
        {
            Ok(credential) => credential,
            Err(e) if e.is_not_yet_ready() => {
                info!("{}, skipping remote cleanup", e);
                return Ok(Action::await_change());
            }
            Err(e) => return Err(e),
        };

        let target = RemoteTarget::new(&agent.spec.address, agent.spec.port, &credential)?;
        match uninstall_agent(self.executor.as_ref(), &target).await? {
            UninstallOutcome::Removed => info!("k3s agent removed from {}", agent.spec.address),
            UninstallOutcome::NotInstalled => {
                info!("No k3s agent was installed on {}", agent.spec.address)
            }
        }

        Ok(Action::await_change())
    }

    /// Record the outcome in the Ready condition and return the resulting
    /// resourceVersion. Failures to patch are logged only; the reconcile
    /// result stays authoritative.
    async fn report_status(&self, agent: &Agent, outcome: &Result<String>) -> Option<String> {
        let mut status = agent.status.clone().unwrap_or_default();
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        match outcome {
            Ok(control_plane) => {
                status.set_ready(
                    true,
                    "Installed",
                    format!("k3s agent installed on {}", agent.spec.address),
                    &now,
                );
                status.installed_address = Some(agent.spec.address.clone());
                status.control_plane_address = Some(control_plane.clone());
            }
            Err(e) => status.set_ready(false, e.reason(), e.to_string(), &now),
        }
        status.observed_generation = agent.metadata.generation;

        let agents: Api<Agent> =
            Api::namespaced(self.client.clone(), &agent.namespace().unwrap_or_default());
        let patch = serde_json::json!({ "status": status });

        match agents
            .patch_status(&agent.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await
        {
            Ok(updated) => updated.resource_version(),
            Err(e) => {
                warn!(
                    "Failed to update status of agent {}: {}",
                    agent.qualified_name(),
                    e
                );
                None
            }
        }
    }
}

async fn reconcile(agent: Arc<Agent>, ctx: Arc<AgentReconciler>) -> Result<Action> {
    let namespace = agent.namespace().unwrap_or_default();
    let agents: Api<Agent> = Api::namespaced(ctx.client.clone(), &namespace);

    debug!("Reconciling agent: {}", agent.qualified_name());

    finalizer(&agents, AGENT_FINALIZER, agent, |event| async move {
        match event {
            FinalizerEvent::Apply(agent) => ctx.apply(&agent).await,
            FinalizerEvent::Cleanup(agent) => ctx.cleanup(&agent).await,
        }
    })
    .await
    .map_err(|e| K3aoError::FinalizerError(Box::new(e)))
}

fn error_policy(agent: Arc<Agent>, error: &K3aoError, ctx: Arc<AgentReconciler>) -> Action {
    let name = agent.qualified_name();
    match error.class() {
        ErrorClass::NotYetReady => info!("Agent {} not ready yet: {}", name, error),
        ErrorClass::Configuration => {
            error!("Agent {} needs operator attention: {}", name, error)
        }
        ErrorClass::Remote | ErrorClass::Permission | ErrorClass::Api => {
            warn!("Reconciliation of agent {} failed: {}", name, error)
        }
    }
    Action::requeue(ctx.config.error_requeue)
}
