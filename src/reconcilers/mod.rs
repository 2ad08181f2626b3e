// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes reconcilers that react to watch events.

pub mod agent;
pub mod ssh_credential;

pub use agent::AgentReconciler;
pub use ssh_credential::SshCredentialReconciler;
