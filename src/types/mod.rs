// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resources served by the operator.

pub mod agent;
pub mod ssh_credential;

pub use agent::{Agent, AgentSpec, AgentStatus, Condition};
pub use ssh_credential::{SshCredential, SshCredentialSpec};
