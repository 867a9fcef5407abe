//! Provider-agnostic LLM client, gateway, and wire types.

mod anthropic;
pub mod client;
mod error;
mod gateway;
pub mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use gateway::{LlmGateway, ProviderConfig};
pub use types::{
    CompletionRequest, CompletionResponse, ContentBlock, FinishReason, Message, Role, TokenUsage, ToolCall, ToolDefinition,
};
