//! Command execution behind a trait, so checks can run against stubs.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// What a finished command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,

    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,

    /// Combined stdout and stderr
    pub output: String,
}

impl CommandOutput {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            output: output.into(),
        }
    }

    pub fn failed(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(exit_code),
            output: output.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("failed to start '{command}': {reason}")]
    Spawn { command: String, reason: String },

    #[error("'{command}' timed out after {timeout_secs}s")]
    TimedOut { command: String, timeout_secs: u64 },
}

/// Runs one shell command line in a directory.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        command: &str,
        cwd: &Path,
        timeout: Duration,
    ) -> Result<CommandOutput, RunError>;
}

/// Runs commands through `sh -c`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellCommandRunner;

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(
        &self,
        command: &str,
        cwd: &Path,
        timeout: Duration,
    ) -> Result<CommandOutput, RunError> {
        debug!(command = %command, cwd = %cwd.display(), "Running feedback command");

        let child = Command::new("sh")
            .args(["-c", command])
            .current_dir(cwd)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(RunError::Spawn {
                    command: command.into(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!(command = %command, timeout_secs = timeout.as_secs(), "Feedback command timed out");
                return Err(RunError::TimedOut {
                    command: command.into(),
                    timeout_secs: timeout.as_secs(),
                });
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(stderr.trim_end());
        }

        Ok(CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            output: combined,
        })
    }
}
