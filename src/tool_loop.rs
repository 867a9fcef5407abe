//! Bounded agentic tool-use dialogue.
//!
//! Drives one agent's turn-by-turn exchange with the model-agnostic
//! `LlmGateway` against the closed tool catalog in `tools::`, turn by
//! turn until the model stops calling tools or the turn budget runs out.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::CostTracker;
use crate::error::ToolLoopError;
use crate::llm::{CompletionRequest, ContentBlock, LlmGateway, Message, Role};
use crate::tools::{ToolContext, ToolExecutor};

const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Drives one agent's dialogue with the model until it stops requesting
/// tools or `max_turns` is reached.
pub struct ToolLoop {
    max_turns: u32,
    temperature: f32,
}

impl ToolLoop {
    pub fn new(max_turns: u32, temperature: f32) -> Self {
        Self { max_turns, temperature }
    }

    /// Run the dialogue to completion (or to the turn cap) and return the
    /// full message history, including every tool call and result.
    pub async fn run(
        &self,
        agent_id: &str,
        system_prompt: &str,
        mut history: Vec<Message>,
        executor: &ToolExecutor,
        gateway: &LlmGateway,
        cost_tracker: &Arc<CostTracker>,
        ctx: &ToolContext,
        model_override: Option<String>,
    ) -> Result<Vec<Message>, ToolLoopError> {
        let tools = executor.definitions();

        for turn in 0..self.max_turns {
            cost_tracker.check_budget()?;

            let request = CompletionRequest {
                system_prompt: system_prompt.to_string(),
                history: history.clone(),
                tools: tools.clone(),
                temperature: self.temperature,
                max_tokens: DEFAULT_MAX_TOKENS,
                model_override: model_override.clone(),
            };

            debug!(agent_id, turn, "ToolLoop::run: submitting turn");
            let response = gateway.send_message(agent_id, request).await?;

            let mut reply_content = Vec::new();
            if let Some(text) = &response.content {
                reply_content.push(ContentBlock::Text { text: text.clone() });
            }
            for call in &response.tool_calls {
                reply_content.push(ContentBlock::ToolUse { id: call.id.clone(), name: call.name.clone(), input: call.arguments.clone() });
            }
            history.push(Message { role: Role::Assistant, content: reply_content });

            if response.tool_calls.is_empty() {
                debug!(agent_id, turn, "ToolLoop::run: no tool calls, returning");
                return Ok(history);
            }

            let results = executor.execute_all(&response.tool_calls, ctx).await;
            let result_blocks = results
                .into_iter()
                .map(|(id, result)| ContentBlock::ToolResult { tool_use_id: id, content: result.content, is_error: result.is_error })
                .collect();
            history.push(Message { role: Role::User, content: result_blocks });
        }

        warn!(agent_id, max_turns = self.max_turns, "ToolLoop::run: reached max_turns, returning as soft timeout");
        Ok(history)
    }
}
