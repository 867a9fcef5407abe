//! Stage and commit workspace changes.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::tools::{Tool, ToolContext, ToolResult};

pub struct GitCommitTool;

#[async_trait]
impl Tool for GitCommitTool {
    fn name(&self) -> &'static str {
        "git_commit"
    }

    fn description(&self) -> &'static str {
        "Stage and commit changes in the kernel workspace."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": {"type": "string", "description": "Commit message describing the change."},
                "files": {"type": "array", "items": {"type": "string"}, "description": "List of file paths to stage. If empty, stages all changes."}
            },
            "required": ["message"],
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "GitCommitTool::execute: called");
        let Some(message) = input["message"].as_str() else {
            return ToolResult::error("message is required");
        };
        let files: Option<Vec<String>> =
            input["files"].as_array().map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect());

        match ctx.workspace.commit(message, files.as_deref()).await {
            Ok(head) => ToolResult::success(format!("Committed as {head}")),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::get_arch_profile;
    use crate::workspace::Workspace;
    use std::sync::Arc;

    #[tokio::test]
    async fn commits_staged_changes() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "swarm");
        ws.init().await.unwrap();
        ws.write_file("a.txt", "x").await.unwrap();
        let ctx = ToolContext::new(Arc::new(ws), "dev-01", "task-1", get_arch_profile("x86_64").unwrap());

        let result = GitCommitTool.execute(serde_json::json!({"message": "add a.txt"}), &ctx).await;
        assert!(!result.is_error);
        assert!(result.content.contains("Committed"));
    }
}
