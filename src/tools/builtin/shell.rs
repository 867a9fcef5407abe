//! Execute an arbitrary shell command in the workspace.
//!
//! No command filtering: the developer, tester, and integrator roles
//! need unrestricted build-tool and QEMU access.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::tools::{Tool, ToolContext, ToolResult};

const MAX_OUTPUT_CHARS: usize = 30_000;

pub struct ShellTool;

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn description(&self) -> &'static str {
        "Execute a shell command in the kernel workspace. Use for build tools, QEMU, etc."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "The shell command to execute."},
                "timeout": {"type": "integer", "description": "Timeout in seconds. Default: 120."}
            },
            "required": ["command"],
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "ShellTool::execute: called");
        let Some(command) = input["command"].as_str() else {
            return ToolResult::error("command is required");
        };
        let timeout_secs = input["timeout"].as_u64().unwrap_or(120);

        let output = match tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            tokio::process::Command::new("sh").arg("-c").arg(command).current_dir(ctx.workspace.root()).output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return ToolResult::error(format!("Failed to execute command: {e}")),
            Err(_) => return ToolResult::error(format!("Command timed out after {timeout_secs}s")),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = if stdout.is_empty() && !stderr.is_empty() {
            stderr.to_string()
        } else if stderr.is_empty() {
            stdout.to_string()
        } else {
            format!("{stdout}\n\nSTDERR:\n{stderr}")
        };

        let truncated = if combined.len() > MAX_OUTPUT_CHARS {
            format!("{}...\n[truncated, {} chars total]", &combined[..MAX_OUTPUT_CHARS], combined.len())
        } else {
            combined
        };

        if output.status.success() {
            ToolResult::success(truncated)
        } else {
            ToolResult::error(format!("Exit code: {}\n{truncated}", output.status.code().unwrap_or(-1)))
        }
    }
}
