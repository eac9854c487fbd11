use anyhow::Result;
use async_trait::async_trait;

use crate::message::OutgoingMessage;

/// Trait for text-completion backends used to answer mentions.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., "gemini", "openrouter").
    fn name(&self) -> &str;

    /// Send a completion request and return the generated text.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;
}

/// Outbound side of a chat platform.
#[async_trait]
pub trait ChatPoster: Send + Sync {
    /// Post a message, optionally as a thread reply.
    async fn post_message(&self, message: &OutgoingMessage) -> Result<()>;
}

/// Request to an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    /// Full prompt, persona preamble included.
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub latency_ms: u64,
}
