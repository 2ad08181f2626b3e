// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Remote execution over ssh

use crate::config::Config;
use crate::constants::exit_status;
use crate::error::{K3aoError, Result};
use crate::kubernetes::CredentialHandle;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Captured output is cut to this many bytes in errors
const MAX_CAPTURED_OUTPUT: usize = 4096;

/// Host a remote operation runs against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub address: String,
    pub port: u16,
    pub username: String,
    pub key_path: PathBuf,
}

impl RemoteTarget {
    /// Fails when the address or username could be read by ssh as an option
    pub fn new(address: &str, port: u16, credential: &CredentialHandle) -> Result<Self> {
        Self {
            address: address.to_string(),
            port,
            username: credential.username().to_string(),
            key_path: credential.key_path().to_path_buf(),
        }
        .validated()
    }

    fn validated(self) -> Result<Self> {
        for (field, value) in [("address", &self.address), ("username", &self.username)] {
            if !is_safe_ssh_word(value) {
                return Err(K3aoError::InvalidRemoteTarget {
                    field,
                    value: value.clone(),
                });
            }
        }
        Ok(self)
    }
}

/// A value that ssh can only take as a plain word: not empty, no leading
/// dash, no whitespace, control characters or `@`.
pub fn is_safe_ssh_word(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('-')
        && !value
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '@')
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.address, self.port)
    }
}

/// A single remote operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    /// Run a shell command
    Exec(String),
    /// Write `contents` to `path`, replacing any existing file
    Upload { path: String, contents: String },
}

impl RemoteCommand {
    /// Shell command executed on the remote side
    pub fn remote_command(&self) -> String {
        match self {
            RemoteCommand::Exec(command) => command.clone(),
            RemoteCommand::Upload { path, .. } => format!("cat > {}", path),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Executes remote operations. Every call either succeeds with a zero exit
/// status or fails with the reason; nothing is fire-and-forget.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(&self, target: &RemoteTarget, command: &RemoteCommand) -> Result<RemoteOutput>;

    async fn run_command(&self, target: &RemoteTarget, command: &str) -> Result<RemoteOutput> {
        self.execute(target, &RemoteCommand::Exec(command.to_string()))
            .await
    }

    async fn upload_file(
        &self,
        target: &RemoteTarget,
        path: &str,
        contents: &str,
    ) -> Result<RemoteOutput> {
        self.execute(
            target,
            &RemoteCommand::Upload {
                path: path.to_string(),
                contents: contents.to_string(),
            },
        )
        .await
    }
}

/// Runs remote operations through the system `ssh` binary
#[derive(Debug, Clone)]
pub struct SshExecutor {
    program: PathBuf,
    timeout: Duration,
    connect_timeout: Duration,
    strict_host_key_checking: String,
}

impl SshExecutor {
    pub fn new(config: &Config) -> Self {
        Self {
            program: config.ssh_program.clone(),
            timeout: config.ssh_timeout,
            connect_timeout: config.ssh_connect_timeout,
            strict_host_key_checking: config.ssh_strict_host_key_checking.clone(),
        }
    }

    fn ssh_args(&self, target: &RemoteTarget, remote_command: &str) -> Vec<String> {
        vec![
            "-l".to_string(),
            target.username.clone(),
            "-i".to_string(),
            target.key_path.display().to_string(),
            "-p".to_string(),
            target.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "IdentitiesOnly=yes".to_string(),
            "-o".to_string(),
            format!("StrictHostKeyChecking={}", self.strict_host_key_checking),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs()),
            "--".to_string(),
            target.address.clone(),
            remote_command.to_string(),
        ]
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    #[instrument(skip(self, command), fields(target = %target))]
    async fn execute(&self, target: &RemoteTarget, command: &RemoteCommand) -> Result<RemoteOutput> {
        let remote_command = command.remote_command();
        let stdin_contents = match command {
            RemoteCommand::Upload { contents, .. } => Some(contents.as_bytes()),
            RemoteCommand::Exec(_) => None,
        };

        debug!("Running remote command: {}", remote_command);

        let mut cmd = Command::new(&self.program);
        cmd.args(self.ssh_args(target, &remote_command))
            .stdin(if stdin_contents.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let run = async {
            let mut child = cmd.spawn()?;
            if let (Some(contents), Some(mut pipe)) = (stdin_contents, child.stdin.take()) {
                pipe.write_all(contents).await?;
                pipe.shutdown().await?;
            }
            child.wait_with_output().await
        };

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| K3aoError::RemoteConnectionFailed {
                target: target.to_string(),
                reason: format!("timed out after {:?}", self.timeout),
            })?
            .map_err(|e| K3aoError::RemoteConnectionFailed {
                target: target.to_string(),
                reason: format!("failed to execute ssh: {}", e),
            })?;

        check_exit(
            target,
            &remote_command,
            output.status.code(),
            RemoteOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
        )
    }
}

/// Map an ssh exit status onto success, connection failure or command failure
fn check_exit(
    target: &RemoteTarget,
    remote_command: &str,
    code: Option<i32>,
    output: RemoteOutput,
) -> Result<RemoteOutput> {
    match code {
        Some(0) => Ok(output),
        Some(exit_status::SSH_CONNECTION_FAILURE) => Err(K3aoError::RemoteConnectionFailed {
            target: target.to_string(),
            reason: truncate(output.stderr.trim()),
        }),
        Some(code) => Err(K3aoError::RemoteCommandFailed {
            command: remote_command.to_string(),
            exit_status: code,
            output: truncate(&combined_output(&output)),
        }),
        None => Err(K3aoError::RemoteConnectionFailed {
            target: target.to_string(),
            reason: "ssh terminated by signal".to_string(),
        }),
    }
}

fn combined_output(output: &RemoteOutput) -> String {
    [output.stdout.trim(), output.stderr.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_CAPTURED_OUTPUT {
        return text.to_string();
    }
    let mut start = text.len() - MAX_CAPTURED_OUTPUT;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}
