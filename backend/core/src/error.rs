use thiserror::Error;

/// Top-level error type for the happychan bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("LLM provider error ({provider}): {message}")]
    LlmError { provider: String, message: String },

    #[error("completion timed out after {0}s")]
    CompletionTimeout(u64),
}
