//! Shell command execution tool.
//!
//! Runs commands via `sh -c` inside the agent's pack directory with a hard
//! timeout. The child is killed when the timeout fires.

use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::required_str;
use crate::tool::{Tool, ToolContext, ToolDefinition, ToolError, ToolOrigin, ToolResult};

/// Execute shell commands rooted at the pack directory.
pub struct RunCommandTool;

impl RunCommandTool {
    pub const NAME: &'static str = "run_command";
    const MAX_TIMEOUT_SECS: u64 = 600;
}

#[async_trait]
impl Tool for RunCommandTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Run a shell command in the agent's install directory and return its output."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "The shell command to execute"
                    },
                    "timeout_secs": {
                        "type": "number",
                        "description": "Timeout in seconds (default 60)"
                    }
                },
                "required": ["command"]
            }),
            origin: ToolOrigin::Builtin,
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let command = required_str(&input, "command")?;
        let pack_dir = context.pack_directory.as_ref().ok_or_else(|| {
            ToolError::NotConfigured("this agent has no install directory for commands".to_string())
        })?;

        let timeout = input
            .get("timeout_secs")
            .and_then(|v| v.as_u64())
            .map(|secs| Duration::from_secs(secs.clamp(1, Self::MAX_TIMEOUT_SECS)))
            .unwrap_or(context.command_timeout);

        debug!(
            command,
            timeout_secs = timeout.as_secs(),
            working_dir = %pack_dir.display(),
            "executing command"
        );

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(pack_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::Io(format!("failed to spawn shell: {e}")))?;

        let mut stdout_pipe = child
            .stdout
            .take()
            .ok_or_else(|| ToolError::Io("stdout not captured".to_string()))?;
        let mut stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| ToolError::Io("stderr not captured".to_string()))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let run = async {
            let (out, err, status) = tokio::join!(
                stdout_pipe.read_to_end(&mut stdout),
                stderr_pipe.read_to_end(&mut stderr),
                child.wait()
            );
            out.and(err).and(status)
        };

        let outcome = tokio::time::timeout(timeout, run).await;
        let stdout_text = String::from_utf8_lossy(&stdout).into_owned();
        let stderr_text = String::from_utf8_lossy(&stderr).into_owned();

        let status = match outcome {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => return Err(ToolError::Io(format!("command execution error: {e}"))),
            Err(_) => {
                warn!(command, timeout_secs = timeout.as_secs(), "command timed out");
                let _ = child.start_kill();
                return Err(ToolError::Timeout {
                    after: timeout,
                    stdout: stdout_text,
                    stderr: stderr_text,
                });
            }
        };

        if !status.success() {
            let code = status.code().unwrap_or(-1);
            debug!(exit_code = code, "command returned non-zero exit code");
            return Err(ToolError::NonZeroExit {
                code,
                stdout: stdout_text,
                stderr: stderr_text,
            });
        }

        let content = match (stdout_text.is_empty(), stderr_text.is_empty()) {
            (true, true) => "(no output)".to_string(),
            (false, true) => stdout_text,
            (true, false) => stderr_text,
            (false, false) => format!("{stdout_text}\n--- stderr ---\n{stderr_text}"),
        };
        Ok(ToolResult::success(content))
    }
}
