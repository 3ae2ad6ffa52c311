//! Bash tool: run a shell command in the working directory.
//!
//! A non-zero exit is not an error: the combined output and exit code come
//! back as ordinary text so the model can react to them.

use async_trait::async_trait;
use deputy_core::error::ToolError;
use deputy_core::role::tool_names::BASH;
use deputy_core::tool::Tool;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::cap_output;
use crate::workspace::Workspace;

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const MAX_TIMEOUT_SECS: u64 = 600;
const MAX_OUTPUT_CHARS: usize = 30_000;

pub struct BashTool {
    workspace: Workspace,
    default_timeout: Duration,
}

impl BashTool {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        BASH
    }

    fn description(&self) -> &str {
        "Run a shell command in the working directory. Returns combined stdout and stderr plus the exit code when it is non-zero."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Timeout in seconds (default 120, max 600)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let command = arguments["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;
        let timeout = arguments["timeout_secs"]
            .as_u64()
            .map(|s| Duration::from_secs(s.clamp(1, MAX_TIMEOUT_SECS)))
            .unwrap_or(self.default_timeout);

        debug!(command = %command, cwd = %self.workspace.root().display(), "Executing shell command");

        let child = Command::new("sh")
            .args(["-c", command])
            .current_dir(self.workspace.root())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ToolError::ExecutionFailed {
                    tool_name: BASH.into(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!(command = %command, timeout_secs = timeout.as_secs(), "Command timed out");
                return Err(ToolError::Timeout {
                    tool_name: BASH.into(),
                    timeout_secs: timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut combined = stdout.trim_end().to_string();
        if !stderr.trim().is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(stderr.trim_end());
        }

        let text = if output.status.success() {
            if combined.is_empty() {
                "(no output)".to_string()
            } else {
                combined
            }
        } else {
            let code = output.status.code().unwrap_or(-1);
            debug!(command = %command, exit_code = code, "Command exited non-zero");
            format!("[exit code: {code}]\n{combined}")
        };

        Ok(cap_output(&text, MAX_OUTPUT_CHARS))
    }
}
