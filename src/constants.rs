// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// API group served by the k3ao custom resources
pub const API_GROUP: &str = "k3ao.devinyoung.io";

/// API version served by the k3ao custom resources
pub const API_VERSION: &str = "v1alpha1";

/// The operator name used as field manager
pub const OPERATOR_NAME: &str = "k3ao";

/// Finalizer that holds an Agent until its host has been deprovisioned
pub const AGENT_FINALIZER: &str = "k3ao.devinyoung.io/agent-cleanup";

/// Kubernetes label and annotation keys used by k3ao
pub mod labels {
    /// Default label selector for the k3s control-plane node
    pub const CONTROL_PLANE_SELECTOR: &str = "node-role.kubernetes.io/master=true";
    /// Annotation k3s sets on a node with its externally reachable IP
    pub const EXTERNAL_IP_ANNOTATION: &str = "k3s.io/external-ip";
    /// Node label prefix rendered into every agent's k3s config
    pub const AGENT_IP_LABEL: &str = "k3s.devinyoung.io/agent-ip";
}

/// Keys of the credential Secret mirrored from an SSHCredential
pub mod secret_keys {
    pub const USERNAME: &str = "username";
    pub const SSH_KEY_CONTENTS: &str = "sshKeyContents";
}

/// Remote layout and k3s installer details
pub mod k3s {
    /// Per-host working directory
    pub const WORK_DIR: &str = "$HOME/.k3ao";
    /// Rendered agent config inside the working directory
    pub const CONFIG_PATH: &str = "$HOME/.k3ao/config.yaml";
    /// Upstream installer script
    pub const INSTALL_SCRIPT_URL: &str = "https://get.k3s.io";
    /// Uninstaller the k3s installer leaves on agent hosts
    pub const UNINSTALL_SCRIPT: &str = "k3s-agent-uninstall.sh";
    /// Port of the k3s supervisor/API on the control plane
    pub const API_PORT: u16 = 6443;
    /// Join token used when none is configured
    pub const LEGACY_JOIN_TOKEN: &str = "homeKluster";
}

/// Exit statuses with a specific meaning at the ssh boundary
pub mod exit_status {
    /// ssh itself failed (connect, auth, host key)
    pub const SSH_CONNECTION_FAILURE: i32 = 255;
    /// Remote shell could not find the command
    pub const COMMAND_NOT_FOUND: i32 = 127;
}

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}
