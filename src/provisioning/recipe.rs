// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! k3s agent install and uninstall sequences

use crate::constants::{exit_status, k3s};
use crate::error::{K3aoError, Result};
use crate::provisioning::remote::{RemoteExecutor, RemoteTarget};
use std::borrow::Cow;
use std::net::IpAddr;
use tracing::{info, instrument};
use url::Url;

/// Where the installer script is downloaded to before it runs
const INSTALL_SCRIPT_PATH: &str = "$HOME/.k3ao/install.sh";

/// Result of an uninstall attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UninstallOutcome {
    Removed,
    /// The uninstall script does not exist on the host
    NotInstalled,
}

/// URL of the k3s supervisor on the control-plane node
pub fn control_plane_url(address: &str) -> Result<String> {
    let invalid = |reason: String| K3aoError::InvalidControlPlaneAddress {
        address: address.to_string(),
        reason,
    };

    let host = match address.parse::<IpAddr>() {
        Ok(IpAddr::V6(ip)) => format!("[{}]", ip),
        Ok(IpAddr::V4(ip)) => ip.to_string(),
        Err(_) => address.to_string(),
    };

    let url = Url::parse(&format!("https://{}:{}", host, k3s::API_PORT))
        .map_err(|e| invalid(e.to_string()))?;

    if url.port() != Some(k3s::API_PORT) || url.path() != "/" || url.query().is_some() {
        return Err(invalid("not a plain host name or IP address".to_string()));
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Installer invocation. The script is fetched first so a failed download
/// fails the step instead of piping nothing into `sh`.
pub fn install_command(join_token: &str, control_plane_url: &str) -> String {
    format!(
        "curl -sfL {url} -o {script} && K3S_TOKEN={token} K3S_CONFIG_FILE={config} K3S_URL={server} sh {script}",
        url = k3s::INSTALL_SCRIPT_URL,
        script = INSTALL_SCRIPT_PATH,
        token = shell_quote(join_token),
        config = k3s::CONFIG_PATH,
        server = shell_quote(control_plane_url),
    )
}

/// Install or re-apply the k3s agent. Every step is safe to repeat and
/// each step's success gates the next.
#[instrument(skip(executor, config_document, join_token), fields(target = %target))]
pub async fn install_agent(
    executor: &dyn RemoteExecutor,
    target: &RemoteTarget,
    config_document: &str,
    join_token: &str,
    control_plane_url: &str,
) -> Result<()> {
    executor
        .run_command(target, &format!("mkdir -p {}", k3s::WORK_DIR))
        .await?;

    executor
        .upload_file(target, k3s::CONFIG_PATH, config_document)
        .await?;

    info!("Installing k3s agent, joining {}", control_plane_url);
    executor
        .run_command(target, &install_command(join_token, control_plane_url))
        .await?;

    Ok(())
}

/// Run the k3s agent uninstaller. A host where the script is missing has
/// nothing to remove.
#[instrument(skip(executor), fields(target = %target))]
pub async fn uninstall_agent(
    executor: &dyn RemoteExecutor,
    target: &RemoteTarget,
) -> Result<UninstallOutcome> {
    match executor.run_command(target, k3s::UNINSTALL_SCRIPT).await {
        Ok(_) => Ok(UninstallOutcome::Removed),
        Err(K3aoError::RemoteCommandFailed {
            exit_status: code, ..
        }) if code == exit_status::COMMAND_NOT_FOUND =>
        {
            info!("{} not found, k3s agent already removed", k3s::UNINSTALL_SCRIPT);
            Ok(UninstallOutcome::NotInstalled)
        }
        Err(e) => Err(e),
    }
}

/// Single-quote `value` for a POSIX shell unless it only has safe characters
fn shell_quote(value: &str) -> Cow<'_, str> {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));
    if safe {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(format!("'{}'", value.replace('\'', r"'\''")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisioning::remote::RemoteCommand;
    use crate::test_utils::RecordingExecutor;
    use std::path::PathBuf;

    fn target() -> RemoteTarget {
        RemoteTarget {
            address: "10.0.0.5".to_string(),
            port: 22,
            username: "ubuntu".to_string(),
            key_path: PathBuf::from("/tmp/k3ao-key-abc"),
        }
    }

    #[test]
    fn test_control_plane_url_ipv4() {
        assert_eq!(
            control_plane_url("203.0.113.9").unwrap(),
            "https://203.0.113.9:6443"
        );
    }

    #[test]
    fn test_control_plane_url_ipv6() {
        assert_eq!(
            control_plane_url("2001:db8::1").unwrap(),
            "https://[2001:db8::1]:6443"
        );
    }

    #[test]
    fn test_control_plane_url_hostname() {
        assert_eq!(
            control_plane_url("cp.example.com").unwrap(),
            "https://cp.example.com:6443"
        );
    }

    #[test]
    fn test_control_plane_url_rejects_garbage() {
        assert!(control_plane_url("cp.example.com/evil").is_err());
        assert!(control_plane_url("bad host").is_err());
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("homeKluster"), "homeKluster");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_install_command() {
        let command = install_command("homeKluster", "https://203.0.113.9:6443");

        assert!(command.starts_with("curl -sfL https://get.k3s.io -o $HOME/.k3ao/install.sh && "));
        assert!(command.contains("K3S_TOKEN=homeKluster"));
        assert!(command.contains("K3S_CONFIG_FILE=$HOME/.k3ao/config.yaml"));
        assert!(command.contains("K3S_URL=https://203.0.113.9:6443"));
    }

    #[tokio::test]
    async fn test_install_sequence_order() {
        let executor = RecordingExecutor::new();
        install_agent(
            &executor,
            &target(),
            "token: homeKluster\n",
            "homeKluster",
            "https://203.0.113.9:6443",
        )
        .await
        .unwrap();

        let calls = executor.commands();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], RemoteCommand::Exec("mkdir -p $HOME/.k3ao".to_string()));
        assert_eq!(
            calls[1],
            RemoteCommand::Upload {
                path: "$HOME/.k3ao/config.yaml".to_string(),
                contents: "token: homeKluster\n".to_string(),
            }
        );
        assert!(matches!(&calls[2], RemoteCommand::Exec(c) if c.contains("K3S_URL=https://203.0.113.9:6443")));
    }

    #[tokio::test]
    async fn test_install_stops_at_first_failure() {
        let executor = RecordingExecutor::new().fail_on("mkdir", 1);
        let err = install_agent(&executor, &target(), "doc", "t", "https://203.0.113.9:6443")
            .await
            .unwrap_err();

        assert!(matches!(err, K3aoError::RemoteCommandFailed { exit_status: 1, .. }));
        assert_eq!(executor.commands().len(), 1);
    }

    #[tokio::test]
    async fn test_uninstall_runs_script() {
        let executor = RecordingExecutor::new();
        let outcome = uninstall_agent(&executor, &target()).await.unwrap();

        assert_eq!(outcome, UninstallOutcome::Removed);
        assert_eq!(
            executor.commands(),
            vec![RemoteCommand::Exec("k3s-agent-uninstall.sh".to_string())]
        );
    }

    #[tokio::test]
    async fn test_uninstall_missing_script_is_not_installed() {
        let executor = RecordingExecutor::new().fail_on("k3s-agent-uninstall.sh", 127);
        let outcome = uninstall_agent(&executor, &target()).await.unwrap();

        assert_eq!(outcome, UninstallOutcome::NotInstalled);
    }

    #[tokio::test]
    async fn test_uninstall_other_failure_propagates() {
        let executor = RecordingExecutor::new().fail_on("k3s-agent-uninstall.sh", 1);
        let err = uninstall_agent(&executor, &target()).await.unwrap_err();

        assert!(matches!(err, K3aoError::RemoteCommandFailed { exit_status: 1, .. }));
    }
}
