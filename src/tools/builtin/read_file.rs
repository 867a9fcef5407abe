//! Read a file out of the workspace.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::tools::{Tool, ToolContext, ToolResult};

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read the contents of a file from the kernel workspace."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Relative path from workspace root (e.g. 'kernel/mm/page_alloc.c')"}
            },
            "required": ["path"],
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "ReadFileTool::execute: called");
        let Some(path) = input["path"].as_str() else {
            return ToolResult::error("path is required");
        };

        match ctx.workspace.read_file(path).await {
            Ok(content) => ToolResult::success(content),
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
    async fn reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "swarm");
        ws.init().await.unwrap();
        ws.write_file("a.txt", "hello").await.unwrap();

        let ctx = ToolContext::new(Arc::new(ws), "dev-01", "task-1", get_arch_profile("x86_64").unwrap());
        let result = ReadFileTool.execute(serde_json::json!({"path": "a.txt"}), &ctx).await;

        assert!(!result.is_error);
        assert_eq!(result.content, "hello");
    }

    #[tokio::test]
    async fn missing_path_argument_errors() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "swarm");
        ws.init().await.unwrap();
        let ctx = ToolContext::new(Arc::new(ws), "dev-01", "task-1", get_arch_profile("x86_64").unwrap());

        let result = ReadFileTool.execute(serde_json::json!({}), &ctx).await;
        assert!(result.is_error);
    }
}
