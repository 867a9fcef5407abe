//! Budget-aware, rate-limited front door to the provider clients.
//!
//! A semaphore caps in-flight calls, a minimum inter-call interval
//! throttles the shared resource, a single rate-limit retry absorbs
//! transient 429s, and every successful call is charged against the
//! calling agent's usage in the shared `CostTracker`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, warn};

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError};
use crate::domain::CostTracker;

const MAX_CONCURRENT_CALLS: usize = 10;
const MIN_CALL_INTERVAL: Duration = Duration::from_millis(100);

/// Maps a `<provider>/<model>` identifier to its dollar-per-million-token
/// input/output pricing. Unknown models fall back to a conservative flat
/// rate so cost accounting degrades gracefully instead of silently
/// reporting zero.
fn price_per_million_tokens(model: &str) -> (f64, f64) {
    match model {
        m if m.contains("opus") => (15.0, 75.0),
        m if m.contains("sonnet") => (3.0, 15.0),
        m if m.contains("haiku") => (0.8, 4.0),
        m if m.contains("gpt-4o") => (2.5, 10.0),
        _ => (3.0, 15.0),
    }
}

fn estimate_cost_usd(model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    let (input_rate, output_rate) = price_per_million_tokens(model);
    (input_tokens as f64 / 1_000_000.0) * input_rate + (output_tokens as f64 / 1_000_000.0) * output_rate
}

/// Resolves API keys and base URLs for `<provider>/<model>` identifiers.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub api_keys: HashMap<String, String>,
    pub endpoints: HashMap<String, String>,
}

impl ProviderConfig {
    fn provider_of(model: &str) -> &str {
        model.split('/').next().unwrap_or(model)
    }

    pub fn api_key_for(&self, model: &str) -> Option<&str> {
        self.api_keys.get(Self::provider_of(model)).map(|s| s.as_str())
    }

    pub fn base_url_for(&self, model: &str) -> Option<&str> {
        self.endpoints.get(Self::provider_of(model)).map(|s| s.as_str())
    }
}

/// Front door every agent sends completion requests through.
pub struct LlmGateway {
    client: Arc<dyn LlmClient>,
    default_model: String,
    cost_tracker: Arc<CostTracker>,
    semaphore: Semaphore,
    last_call: Mutex<Option<Instant>>,
}

impl LlmGateway {
    pub fn new(client: Arc<dyn LlmClient>, default_model: impl Into<String>, cost_tracker: Arc<CostTracker>) -> Self {
        Self {
            client,
            default_model: default_model.into(),
            cost_tracker,
            semaphore: Semaphore::new(MAX_CONCURRENT_CALLS),
            last_call: Mutex::new(None),
        }
    }

    /// Send one request on behalf of `agent_id`. Checks the budget first,
    /// throttles to the minimum inter-call interval, retries exactly once
    /// on a rate-limit response, and records usage against the agent.
    pub async fn send_message(&self, agent_id: &str, mut request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.cost_tracker.check_budget()?;

        if request.model_override.is_none() {
            request.model_override = Some(self.default_model.clone());
        }
        let model = request.model_override.clone().unwrap_or_else(|| self.default_model.clone());

        let _permit = self.semaphore.acquire().await.expect("semaphore never closed");
        self.wait_for_slot().await;

        debug!(agent_id, model = %model, "LlmGateway::send_message: dispatching");
        let response = match self.client.complete(request.clone()).await {
            Ok(resp) => resp,
            Err(LlmError::RateLimited { retry_after }) => {
                warn!(agent_id, ?retry_after, "LlmGateway::send_message: rate limited, retrying once");
                tokio::time::sleep(retry_after).await;
                self.client.complete(request).await?
            }
            Err(other) => return Err(other),
        };

        let cost = estimate_cost_usd(&model, response.usage.input_tokens, response.usage.output_tokens);
        self.cost_tracker.record(agent_id, response.usage.input_tokens, response.usage.output_tokens, cost);
        debug!(agent_id, input = response.usage.input_tokens, output = response.usage.output_tokens, cost, "LlmGateway::send_message: usage recorded");

        Ok(response)
    }

    async fn wait_for_slot(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < MIN_CALL_INTERVAL {
                tokio::time::sleep(MIN_CALL_INTERVAL - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use crate::llm::{FinishReason, Message, TokenUsage};

    fn sample_request() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "test".to_string(),
            history: vec![Message::user_text("hi")],
            tools: vec![],
            temperature: 0.0,
            max_tokens: 100,
            model_override: None,
        }
    }

    #[tokio::test]
    async fn records_usage_against_calling_agent() {
        let client: Arc<dyn LlmClient> = Arc::new(MockLlmClient::text_only(vec!["hello"]));
        let tracker = Arc::new(CostTracker::new(100.0, 90.0));
        let gateway = LlmGateway::new(client, "anthropic/claude-sonnet-4", tracker.clone());

        gateway.send_message("dev-01", sample_request()).await.unwrap();

        let usage = tracker.usage_for("dev-01");
        assert_eq!(usage.input_tokens, 10);
        assert!(usage.total_cost_usd > 0.0);
    }

    #[tokio::test]
    async fn budget_exceeded_short_circuits_before_dispatch() {
        let client: Arc<dyn LlmClient> = Arc::new(MockLlmClient::text_only(vec!["hello"]));
        let tracker = Arc::new(CostTracker::new(1.0, 0.5));
        tracker.record("dev-01", 0, 0, 1.5);
        let gateway = LlmGateway::new(client, "anthropic/claude-sonnet-4", tracker);

        let err = gateway.send_message("dev-01", sample_request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Budget(_)));
    }

    #[tokio::test]
    async fn missing_model_override_falls_back_to_default() {
        let client: Arc<dyn LlmClient> = Arc::new(MockLlmClient::new(vec![CompletionResponse {
            content: Some("ok".to_string()),
            tool_calls: vec![],
            finish_reason: FinishReason::EndTurn,
            model: "anthropic/claude-sonnet-4".to_string(),
            usage: TokenUsage { input_tokens: 1, output_tokens: 1 },
            raw: serde_json::Value::Null,
        }]));
        let tracker = Arc::new(CostTracker::new(100.0, 90.0));
        let gateway = LlmGateway::new(client, "anthropic/claude-sonnet-4", tracker);

        let resp = gateway.send_message("dev-01", sample_request()).await.unwrap();
        assert_eq!(resp.content, Some("ok".to_string()));
    }
}
