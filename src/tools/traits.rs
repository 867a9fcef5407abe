//! Tool trait and the shapes passed across the executor boundary.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::ArchProfile;
use crate::workspace::Workspace;

/// Everything a tool needs to act on behalf of one agent working one task.
pub struct ToolContext {
    pub workspace: Arc<Workspace>,
    pub agent_id: String,
    pub task_id: String,
    pub arch_profile: ArchProfile,
}

impl ToolContext {
    pub fn new(workspace: Arc<Workspace>, agent_id: impl Into<String>, task_id: impl Into<String>, arch_profile: ArchProfile) -> Self {
        Self { workspace, agent_id: agent_id.into(), task_id: task_id.into(), arch_profile }
    }
}

/// The outcome of one tool call, appended to the dialogue as a tool-result
/// content block.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_error: false }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_error: true }
    }
}

/// One capability an agent can invoke. Implementors describe their own
/// name, description, and JSON-schema input shape so the tool catalog is
/// closed and self-documenting.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn input_schema(&self) -> Value;
    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult;
}
