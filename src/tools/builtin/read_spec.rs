//! Read a subsystem specification document out of the workspace's
//! `specs/` directory. Specification content is data, not orchestrator
//! logic; this tool only resolves the conventional path and returns the
//! bytes.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::tools::{Tool, ToolContext, ToolResult};

pub struct ReadSpecTool;

#[async_trait]
impl Tool for ReadSpecTool {
    fn name(&self) -> &'static str {
        "read_spec"
    }

    fn description(&self) -> &'static str {
        "Read a kernel subsystem specification document."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "subsystem": {
                    "type": "string",
                    "description": "Subsystem name: 'architecture', 'boot', 'mm', 'sched', 'ipc', 'dev', 'slm', 'drivers', 'fs', 'net', 'pkg', 'sys', 'hal', 'arch/x86_64', 'arch/aarch64', 'arch/riscv64'."
                }
            },
            "required": ["subsystem"],
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "ReadSpecTool::execute: called");
        let Some(subsystem) = input["subsystem"].as_str() else {
            return ToolResult::error("subsystem is required");
        };

        let path = format!("specs/{subsystem}.md");
        match ctx.workspace.read_file(&path).await {
            Ok(content) => ToolResult::success(content),
            Err(e) => ToolResult::error(format!("No spec for '{subsystem}': {e}")),
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
    async fn reads_spec_document_by_subsystem_name() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "swarm");
        ws.init().await.unwrap();
        ws.write_file("specs/mm.md", "# Memory management").await.unwrap();
        let ctx = ToolContext::new(Arc::new(ws), "dev-01", "task-1", get_arch_profile("x86_64").unwrap());

        let result = ReadSpecTool.execute(serde_json::json!({"subsystem": "mm"}), &ctx).await;
        assert!(!result.is_error);
        assert!(result.content.contains("Memory management"));
    }

    #[tokio::test]
    async fn missing_spec_is_reported_not_as_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "swarm");
        ws.init().await.unwrap();
        let ctx = ToolContext::new(Arc::new(ws), "dev-01", "task-1", get_arch_profile("x86_64").unwrap());

        let result = ReadSpecTool.execute(serde_json::json!({"subsystem": "net"}), &ctx).await;
        assert!(result.is_error);
    }
}
