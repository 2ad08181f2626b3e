// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Control-plane node lookup

use crate::constants::labels;
use crate::error::{K3aoError, Result};
use k8s_openapi::api::core::v1::Node;
use kube::{api::ListParams, Api, Client, ResourceExt};
use tracing::{debug, instrument};

/// Find the externally reachable address of the control-plane node.
///
/// When several nodes match the selector the one with the lexically
/// smallest name wins, so repeated lookups agree.
#[instrument(skip(client))]
pub async fn find_control_plane(client: &Client, selector: &str) -> Result<String> {
    let nodes: Api<Node> = Api::all(client.clone());
    let node_list = nodes.list(&ListParams::default().labels(selector)).await?;

    let node = select_control_plane(node_list.items)
        .ok_or_else(|| K3aoError::NoControlPlaneFound(selector.to_string()))?;

    let address = external_ip(&node)?;
    debug!("Using control-plane node {} at {}", node.name_any(), address);
    Ok(address)
}

fn select_control_plane(nodes: Vec<Node>) -> Option<Node> {
    nodes.into_iter().min_by_key(|n| n.name_any())
}

fn external_ip(node: &Node) -> Result<String> {
    node.annotations()
        .get(labels::EXTERNAL_IP_ANNOTATION)
        .map(|ip| ip.trim())
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .ok_or_else(|| K3aoError::MissingExternalIpAnnotation {
            node: node.name_any(),
            annotation: labels::EXTERNAL_IP_ANNOTATION.to_string(),
        })
}
