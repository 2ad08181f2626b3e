// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};

/// Condition type reported on every Agent
pub const READY_CONDITION: &str = "Ready";

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[kube(group = "k3ao.devinyoung.io", version = "v1alpha1", kind = "Agent")]
#[kube(namespaced)]
#[kube(status = "AgentStatus")]
#[kube(printcolumn = r#"{"name":"Address","type":"string","jsonPath":".spec.address"}"#)]
#[kube(
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    /// Host reachable over SSH
    pub address: String,
    /// SSH port
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Secret in the Agent's namespace holding `username` and `sshKeyContents`
    pub ssh_key_secret_name: String,
}

fn default_ssh_port() -> u16 {
    22
}

impl Agent {
    /// `namespace/name` of this Agent, for logs and errors
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.namespace().unwrap_or_default(), self.name_any())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// Host the k3s agent was last installed on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed_address: Option<String>,
    /// Control-plane address the agent was joined against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_plane_address: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

impl AgentStatus {
    pub fn ready_condition(&self) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == READY_CONDITION)
    }

    /// Set the Ready condition. The transition time only moves when the
    /// condition's status value changes.
    pub fn set_ready(&mut self, ready: bool, reason: &str, message: impl Into<String>, now: &str) {
        let status = if ready { "True" } else { "False" };
        let last_transition_time = match self.ready_condition() {
            Some(existing) if existing.status == status => existing.last_transition_time.clone(),
            _ => Some(now.to_string()),
        };

        let condition = Condition {
            condition_type: READY_CONDITION.to_string(),
            status: status.to_string(),
            reason: Some(reason.to_string()),
            message: Some(message.into()),
            last_transition_time,
        };

        self.conditions
            .retain(|c| c.condition_type != READY_CONDITION);
        self.conditions.push(condition);
    }
}
