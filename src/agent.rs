//! Role + prompt + tool set + ToolLoop driver.
//!
//! Every role is the same `Agent` struct carrying a different system
//! prompt and tool catalog, rather than a distinct type per role; only
//! the data differs, behavior is uniform.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::CostTracker;
use crate::error::ToolLoopError;
use crate::llm::{LlmGateway, Message};
use crate::tool_loop::ToolLoop;
use crate::tools::{ToolContext, ToolExecutor};

/// The specialized roles a task can be assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Manager,
    Architect,
    Developer,
    Reviewer,
    Tester,
    Integrator,
}

impl AgentRole {
    /// The string key used for tool-catalog lookup and task `assigned_role`.
    pub fn as_str(self) -> &'static str {
        match self {
            AgentRole::Manager => "manager",
            AgentRole::Architect => "architect",
            AgentRole::Developer => "developer",
            AgentRole::Reviewer => "reviewer",
            AgentRole::Tester => "tester",
            AgentRole::Integrator => "integrator",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One role-specialized worker: a system prompt, a tool catalog, and a
/// bounded dialogue driver. Behavior is uniform across roles; only the
/// prompt and catalog data differ.
pub struct Agent {
    pub id: String,
    pub role: AgentRole,
    system_prompt: String,
    tools: ToolExecutor,
    tool_loop: ToolLoop,
    model: Option<String>,
}

impl Agent {
    pub fn new(id: impl Into<String>, role: AgentRole, system_prompt: impl Into<String>, max_turns: u32, temperature: f32) -> Self {
        let id = id.into();
        debug!(%id, %role, "Agent::new: called");
        Self { tools: ToolExecutor::for_role(role.as_str()), tool_loop: ToolLoop::new(max_turns, temperature), id, role, system_prompt: system_prompt.into(), model: None }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Drive one bounded dialogue against `gateway`, starting from
    /// `history`, with tool calls executed in `ctx`'s workspace.
    pub async fn run(
        &self,
        history: Vec<Message>,
        gateway: &LlmGateway,
        cost_tracker: &Arc<CostTracker>,
        ctx: &ToolContext,
    ) -> Result<Vec<Message>, ToolLoopError> {
        self.tool_loop.run(&self.id, &self.system_prompt, history, &self.tools, gateway, cost_tracker, ctx, self.model.clone()).await
    }

    pub fn tool_catalog_names(&self) -> Vec<String> {
        self.tools.definitions().into_iter().map(|d| d.name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_display_matches_string_key() {
        assert_eq!(AgentRole::Developer.to_string(), "developer");
        assert_eq!(AgentRole::Integrator.as_str(), "integrator");
    }

    #[test]
    fn developer_agent_gets_build_and_shell_tools() {
        let agent = Agent::new("dev-01", AgentRole::Developer, "you write kernel code", 20, 0.2);
        let names = agent.tool_catalog_names();
        assert!(names.contains(&"build_kernel".to_string()));
        assert!(names.contains(&"shell".to_string()));
    }

    #[test]
    fn reviewer_agent_has_no_write_tools() {
        let agent = Agent::new("rev-01", AgentRole::Reviewer, "you review diffs", 10, 0.1);
        let names = agent.tool_catalog_names();
        assert!(!names.contains(&"write_file".to_string()));
    }
}
