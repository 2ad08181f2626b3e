// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::runtime::finalizer;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum K3aoError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Credential secret {namespace}/{name} not found")]
    CredentialNotFound { namespace: String, name: String },

    #[error("Failed to read credential secret {namespace}/{name}: {source}")]
    CredentialAccess {
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("Invalid credential secret: {0}")]
    InvalidCredential(String),

    #[error("No control-plane node matches selector '{0}'")]
    NoControlPlaneFound(String),

    #[error("Control-plane node {node} has no '{annotation}' annotation")]
    MissingExternalIpAnnotation { node: String, annotation: String },

    #[error("Invalid control-plane address '{address}': {reason}")]
    InvalidControlPlaneAddress { address: String, reason: String },

    #[error("Refusing to use {field} '{value}' as an ssh argument")]
    InvalidRemoteTarget { field: &'static str, value: String },

    #[error("Connection to {target} failed: {reason}")]
    RemoteConnectionFailed { target: String, reason: String },

    #[error("Remote command '{command}' exited with status {exit_status}: {output}")]
    RemoteCommandFailed {
        command: String,
        exit_status: i32,
        output: String,
    },

    #[error("Failed to materialize SSH key file: {0}")]
    KeyFile(#[source] std::io::Error),

    #[error("Failed to render k3s config: {0}")]
    ConfigRender(#[from] serde_yaml::Error),

    #[error("Finalizer error: {0}")]
    FinalizerError(#[source] Box<finalizer::Error<K3aoError>>),
}

/// Operator-facing classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// A companion resource has not synced yet, resolves by itself
    NotYetReady,
    /// Needs operator intervention in the cluster
    Configuration,
    /// Likely transient network or host problem
    Remote,
    /// Local key file could not be written
    Permission,
    /// Cluster API failure
    Api,
}

impl K3aoError {
    pub fn class(&self) -> ErrorClass {
        match self {
            K3aoError::CredentialNotFound { .. } => ErrorClass::NotYetReady,
            K3aoError::InvalidCredential(_)
            | K3aoError::NoControlPlaneFound(_)
            | K3aoError::MissingExternalIpAnnotation { .. }
            | K3aoError::InvalidControlPlaneAddress { .. }
            | K3aoError::InvalidRemoteTarget { .. }
            | K3aoError::ConfigRender(_) => ErrorClass::Configuration,
            K3aoError::RemoteConnectionFailed { .. } | K3aoError::RemoteCommandFailed { .. } => {
                ErrorClass::Remote
            }
            K3aoError::KeyFile(_) => ErrorClass::Permission,
            K3aoError::KubeError(_) | K3aoError::CredentialAccess { .. } => ErrorClass::Api,
            K3aoError::FinalizerError(e) => match &**e {
                finalizer::Error::ApplyFailed(inner) | finalizer::Error::CleanupFailed(inner) => {
                    inner.class()
                }
                _ => ErrorClass::Api,
            },
        }
    }

    /// CamelCase reason used on status conditions
    pub fn reason(&self) -> &'static str {
        match self {
            K3aoError::KubeError(_) => "KubernetesApiError",
            K3aoError::CredentialNotFound { .. } => "CredentialNotFound",
            K3aoError::CredentialAccess { .. } => "CredentialAccessError",
            K3aoError::InvalidCredential(_) => "InvalidCredential",
            K3aoError::NoControlPlaneFound(_) => "NoControlPlaneFound",
            K3aoError::MissingExternalIpAnnotation { .. } => "MissingExternalIPAnnotation",
            K3aoError::InvalidControlPlaneAddress { .. } => "InvalidControlPlaneAddress",
            K3aoError::InvalidRemoteTarget { .. } => "InvalidRemoteTarget",
            K3aoError::RemoteConnectionFailed { .. } => "RemoteConnectionFailed",
            K3aoError::RemoteCommandFailed { .. } => "RemoteCommandFailed",
            K3aoError::KeyFile(_) => "PermissionError",
            K3aoError::ConfigRender(_) => "ConfigRenderError",
            K3aoError::FinalizerError(_) => "FinalizerError",
        }
    }

    pub fn is_not_yet_ready(&self) -> bool {
        self.class() == ErrorClass::NotYetReady
    }
}

pub type Result<T> = std::result::Result<T, K3aoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_not_found_is_not_yet_ready() {
        let err = K3aoError::CredentialNotFound {
            namespace: "default".to_string(),
            name: "creds".to_string(),
        };
        assert!(err.is_not_yet_ready());
        assert_eq!(err.reason(), "CredentialNotFound");
    }

    #[test]
    fn test_control_plane_errors_are_configuration() {
        let err = K3aoError::NoControlPlaneFound("role=master".to_string());
        assert_eq!(err.class(), ErrorClass::Configuration);

        let err = K3aoError::MissingExternalIpAnnotation {
            node: "cp-0".to_string(),
            annotation: "k3s.io/external-ip".to_string(),
        };
        assert_eq!(err.class(), ErrorClass::Configuration);
        assert_eq!(err.reason(), "MissingExternalIPAnnotation");
    }

    #[test]
    fn test_remote_command_failure_keeps_context() {
        let err = K3aoError::RemoteCommandFailed {
            command: "mkdir -p $HOME/.k3ao".to_string(),
            exit_status: 1,
            output: "Permission denied".to_string(),
        };
        assert_eq!(err.class(), ErrorClass::Remote);
        let msg = err.to_string();
        assert!(msg.contains("mkdir -p $HOME/.k3ao"));
        assert!(msg.contains("status 1"));
        assert!(msg.contains("Permission denied"));
    }

    #[test]
    fn test_finalizer_error_classified_by_inner_error() {
        let inner = K3aoError::RemoteConnectionFailed {
            target: "ubuntu@10.0.0.5:22".to_string(),
            reason: "timed out".to_string(),
        };
        let err = K3aoError::FinalizerError(Box::new(finalizer::Error::CleanupFailed(inner)));
        assert_eq!(err.class(), ErrorClass::Remote);
    }

    #[test]
    fn test_key_file_error_is_permission() {
        let err = K3aoError::KeyFile(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert_eq!(err.class(), ErrorClass::Permission);
        assert_eq!(err.reason(), "PermissionError");
    }

    #[test]
    fn test_invalid_remote_target_is_configuration() {
        let err = K3aoError::InvalidRemoteTarget {
            field: "username",
            value: "-oProxyCommand=id".to_string(),
        };
        assert_eq!(err.class(), ErrorClass::Configuration);
        assert_eq!(err.reason(), "InvalidRemoteTarget");
    }
}
