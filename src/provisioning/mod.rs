// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Remote provisioning of k3s agents over ssh.

pub mod k3s_config;
pub mod recipe;
pub mod remote;

pub use k3s_config::ConfigRenderer;
pub use recipe::{control_plane_url, install_agent, uninstall_agent, UninstallOutcome};
pub use remote::{RemoteCommand, RemoteExecutor, RemoteOutput, RemoteTarget, SshExecutor};
