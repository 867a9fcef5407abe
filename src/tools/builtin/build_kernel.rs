//! Compile the workspace through `BuildValidator`.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::tools::{Tool, ToolContext, ToolResult};
use crate::validation::BuildValidator;

pub struct BuildKernelTool;

#[async_trait]
impl Tool for BuildKernelTool {
    fn name(&self) -> &'static str {
        "build_kernel"
    }

    fn description(&self) -> &'static str {
        "Compile the kernel code. Returns build output including any errors."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "target": {"type": "string", "description": "Build target: 'all', 'boot', 'kernel', 'clean'. Default: 'all'."}
            },
            "required": [],
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "BuildKernelTool::execute: called");
        let target = input["target"].as_str();

        let validator = BuildValidator::new(ctx.workspace.root());
        let result = validator.build_target(target).await;

        if result.success {
            ToolResult::success(format!("Build succeeded in {:.1}s\n{}", result.duration_secs, result.stdout))
        } else {
            let diagnostics = result.errors.iter().map(|d| format!("{}:{}: {}", d.file, d.line, d.message)).collect::<Vec<_>>().join("\n");
            ToolResult::error(format!("Build failed in {:.1}s\n{}\n{diagnostics}", result.duration_secs, result.stderr))
        }
    }
}
