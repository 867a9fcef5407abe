//! Write a file into the workspace, creating parent directories as needed.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::tools::{Tool, ToolContext, ToolResult};

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Write content to a file in the kernel workspace. Creates parent directories if needed."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Relative path from workspace root"},
                "content": {"type": "string", "description": "The full content to write to the file"}
            },
            "required": ["path", "content"],
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "WriteFileTool::execute: called");
        let Some(path) = input["path"].as_str() else {
            return ToolResult::error("path is required");
        };
        let Some(content) = input["content"].as_str() else {
            return ToolResult::error("content is required");
        };

        match ctx.workspace.write_file(path, content).await {
            Ok(()) => ToolResult::success(format!("Wrote {} bytes to {path}", content.len())),
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
    async fn writes_and_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "swarm");
        ws.init().await.unwrap();
        let ctx = ToolContext::new(Arc::new(ws), "dev-01", "task-1", get_arch_profile("x86_64").unwrap());

        let result = WriteFileTool
            .execute(serde_json::json!({"path": "kernel/mm/page_alloc.c", "content": "void x() {}"}), &ctx)
            .await;

        assert!(!result.is_error);
        let written = ctx.workspace.read_file("kernel/mm/page_alloc.c").await.unwrap();
        assert_eq!(written, "void x() {}");
    }
}
