//! Regex search across the workspace.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::tools::{Tool, ToolContext, ToolResult};

pub struct SearchCodeTool;

#[async_trait]
impl Tool for SearchCodeTool {
    fn name(&self) -> &'static str {
        "search_code"
    }

    fn description(&self) -> &'static str {
        "Search for a pattern in the kernel workspace using regex."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string", "description": "Regex pattern to search for"},
                "glob": {"type": "string", "description": "File glob pattern to filter (e.g. '*.c', '*.h'). Default: all files."}
            },
            "required": ["pattern"],
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "SearchCodeTool::execute: called");
        let Some(pattern) = input["pattern"].as_str() else {
            return ToolResult::error("pattern is required");
        };
        let glob = input["glob"].as_str();

        match ctx.workspace.search_code(pattern, glob) {
            Ok(hits) if hits.is_empty() => ToolResult::success("(no matches)"),
            Ok(hits) => {
                let rendered = hits.iter().map(|h| format!("{}:{}: {}", h.file, h.line, h.content)).collect::<Vec<_>>().join("\n");
                ToolResult::success(rendered)
            }
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
    async fn finds_pattern_matches() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "swarm");
        ws.init().await.unwrap();
        ws.write_file("kernel/sched.c", "void schedule() {}\n").await.unwrap();
        let ctx = ToolContext::new(Arc::new(ws), "dev-01", "task-1", get_arch_profile("x86_64").unwrap());

        let result = SearchCodeTool.execute(serde_json::json!({"pattern": "schedule"}), &ctx).await;
        assert!(!result.is_error);
        assert!(result.content.contains("kernel/sched.c"));
    }
}
