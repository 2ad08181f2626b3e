// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Rendering of the k3s agent config file

use crate::constants::labels;
use crate::error::Result;
use serde::Serialize;

/// Document the k3s installer reads through `K3S_CONFIG_FILE`
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct K3sAgentConfig {
    pub token: String,
    #[serde(rename = "node-external-ip")]
    pub node_external_ip: String,
    #[serde(rename = "node-label")]
    pub node_label: Vec<String>,
}

/// Renders agent configs for a fixed join token
#[derive(Debug, Clone)]
pub struct ConfigRenderer {
    join_token: String,
}

impl ConfigRenderer {
    pub fn new(join_token: impl Into<String>) -> Self {
        Self {
            join_token: join_token.into(),
        }
    }

    pub fn join_token(&self) -> &str {
        &self.join_token
    }

    pub fn config_for(&self, address: &str) -> K3sAgentConfig {
        K3sAgentConfig {
            token: self.join_token.clone(),
            node_external_ip: address.to_string(),
            node_label: vec![format!("{}={}", labels::AGENT_IP_LABEL, address)],
        }
    }

    /// Render the YAML document for an agent at `address`
    pub fn render(&self, address: &str) -> Result<String> {
        Ok(serde_yaml::to_string(&self.config_for(address))?)
    }
}
