//! LlmClient trait definition.

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// A single provider-backed completion call. The gateway is responsible
/// for budget checks, concurrency limiting, and retry; implementors of
/// this trait only need to speak one provider's wire format.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

#[cfg(test)]
pub mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tracing::debug;

    use super::*;
    use crate::llm::{FinishReason, TokenUsage};

    /// Returns a fixed sequence of responses, one per call, in order.
    /// Errors once the sequence is exhausted.
    pub struct MockLlmClient {
        responses: Vec<CompletionResponse>,
        call_count: AtomicUsize,
    }

    impl MockLlmClient {
        pub fn new(responses: Vec<CompletionResponse>) -> Self {
            debug!(response_count = responses.len(), "MockLlmClient::new: called");
            Self { responses, call_count: AtomicUsize::new(0) }
        }

        pub fn text_only(replies: Vec<&str>) -> Self {
            Self::new(
                replies
                    .into_iter()
                    .map(|text| CompletionResponse {
                        content: Some(text.to_string()),
                        tool_calls: vec![],
                        finish_reason: FinishReason::EndTurn,
                        model: "mock/mock-1".to_string(),
                        usage: TokenUsage { input_tokens: 10, output_tokens: 10 },
                        raw: serde_json::Value::Null,
                    })
                    .collect(),
            )
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            self.responses.get(idx).cloned().ok_or_else(|| LlmError::InvalidResponse("no more mock responses".to_string()))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn returns_responses_in_order_then_errors() {
            let client = MockLlmClient::text_only(vec!["first", "second"]);
            let req = CompletionRequest {
                system_prompt: "test".to_string(),
                history: vec![],
                tools: vec![],
                temperature: 0.0,
                max_tokens: 100,
                model_override: None,
            };

            let r1 = client.complete(req.clone()).await.unwrap();
            assert_eq!(r1.content, Some("first".to_string()));
            let r2 = client.complete(req.clone()).await.unwrap();
            assert_eq!(r2.content, Some("second".to_string()));
            assert!(client.complete(req).await.is_err());
            assert_eq!(client.call_count(), 3);
        }
    }
}
