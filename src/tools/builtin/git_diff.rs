//! Show working-tree or branch-comparison diffs.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::tools::{Tool, ToolContext, ToolResult};

pub struct GitDiffTool;

#[async_trait]
impl Tool for GitDiffTool {
    fn name(&self) -> &'static str {
        "git_diff"
    }

    fn description(&self) -> &'static str {
        "Show the current uncommitted changes or diff between branches."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "branch": {"type": "string", "description": "Compare against this branch. Default: show working tree changes."}
            },
            "required": [],
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "GitDiffTool::execute: called");
        let branch = input["branch"].as_str();

        match ctx.workspace.diff(branch).await {
            Ok(diff) if diff.is_empty() => ToolResult::success("(no changes)"),
            Ok(diff) => ToolResult::success(diff),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}
