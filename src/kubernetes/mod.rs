// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for CRD discovery, credential resolution and node lookup.

pub mod credentials;
pub mod crd;
pub mod nodes;

pub use credentials::{resolve_credential, CredentialHandle};
pub use crd::wait_for_crds;
pub use nodes::find_control_plane;
