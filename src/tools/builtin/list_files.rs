//! List files under a workspace directory.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::tools::{Tool, ToolContext, ToolResult};

pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &'static str {
        "list_files"
    }

    fn description(&self) -> &'static str {
        "List files in a directory of the kernel workspace."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Relative directory path from workspace root. Default: root."},
                "recursive": {"type": "boolean", "description": "List files recursively. Default: false."}
            },
            "required": [],
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "ListFilesTool::execute: called");
        let path = input["path"].as_str().unwrap_or("");
        let recursive = input["recursive"].as_bool().unwrap_or(false);

        let files = ctx.workspace.list_files(path, recursive);
        if files.is_empty() {
            ToolResult::success("(no files)")
        } else {
            ToolResult::success(files.join("\n"))
        }
    }
}
