//! Tool catalog and dispatch.
//!
//! A closed `HashMap<String, Box<dyn Tool>>` the loop looks up by name,
//! rather than dynamic dispatch by string matching.

pub mod builtin;
mod traits;

use std::collections::HashMap;

use tracing::debug;

use crate::llm::{ToolCall, ToolDefinition};
pub use traits::{Tool, ToolContext, ToolResult};

/// Manages tool execution for one agent role.
pub struct ToolExecutor {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolExecutor {
    pub fn empty() -> Self {
        Self { tools: HashMap::new() }
    }

    /// Build the tool catalog appropriate for the given role. Unknown
    /// roles fall back to the full catalog rather than leaving an agent
    /// with no tools at all.
    pub fn for_role(role: &str) -> Self {
        debug!(role, "ToolExecutor::for_role: called");
        let mut executor = Self::empty();

        use builtin::*;
        match role {
            "manager" => {
                executor.add_tool(Box::new(ReadSpecTool));
                executor.add_tool(Box::new(ListFilesTool));
                executor.add_tool(Box::new(ReadFileTool));
                executor.add_tool(Box::new(SearchCodeTool));
            }
            "architect" => {
                executor.add_tool(Box::new(ReadSpecTool));
                executor.add_tool(Box::new(ReadFileTool));
                executor.add_tool(Box::new(WriteFileTool));
                executor.add_tool(Box::new(ListFilesTool));
                executor.add_tool(Box::new(SearchCodeTool));
            }
            "reviewer" => {
                executor.add_tool(Box::new(ReadFileTool));
                executor.add_tool(Box::new(ListFilesTool));
                executor.add_tool(Box::new(SearchCodeTool));
                executor.add_tool(Box::new(GitDiffTool));
                executor.add_tool(Box::new(ReadSpecTool));
            }
            // developer, tester, integrator all get the full read+write+build+test+git catalog
            _ => {
                executor.add_tool(Box::new(ReadSpecTool));
                executor.add_tool(Box::new(ReadFileTool));
                executor.add_tool(Box::new(WriteFileTool));
                executor.add_tool(Box::new(ListFilesTool));
                executor.add_tool(Box::new(SearchCodeTool));
                executor.add_tool(Box::new(BuildKernelTool));
                executor.add_tool(Box::new(RunTestTool));
                executor.add_tool(Box::new(GitCommitTool));
                executor.add_tool(Box::new(GitDiffTool));
                executor.add_tool(Box::new(ShellTool));
            }
        }

        executor
    }

    pub fn add_tool(&mut self, tool: Box<dyn Tool>) {
        debug!(tool_name = tool.name(), "ToolExecutor::add_tool: called");
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| ToolDefinition { name: t.name().to_string(), description: t.description().to_string(), input_schema: t.input_schema() }).collect()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Invoke one tool call. Unknown tool names return an explanatory
    /// string rather than failing the loop.
    pub async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> ToolResult {
        debug!(tool_name = %call.name, tool_id = %call.id, "ToolExecutor::execute: called");
        match self.tools.get(&call.name) {
            Some(tool) => tool.execute(call.arguments.clone(), ctx).await,
            None => ToolResult::error(format!("Unknown tool: {}", call.name)),
        }
    }

    /// Execute every call in `calls`, in order, pairing each result with
    /// its call id.
    pub async fn execute_all(&self, calls: &[ToolCall], ctx: &ToolContext) -> Vec<(String, ToolResult)> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let result = self.execute(call, ctx).await;
            results.push((call.id.clone(), result));
        }
        results
    }
}
