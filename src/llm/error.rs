//! Errors surfaced by the LLM gateway.

use std::time::Duration;

use thiserror::Error;

/// Includes a `Budget` variant so the gateway's pre-flight budget check
/// has somewhere to surface it without reaching into `EngineError`.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("api error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Budget(#[from] crate::domain::cost::BudgetExceeded),
}
