use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use happychan_core::{BridgeError, LlmProvider, LlmRequest};

use crate::mention::strip_mentions;
use crate::persona::Persona;

/// Generation parameters for the completion call.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            max_tokens: 1024,
            temperature: 0.9,
            timeout: Duration::from_secs(20),
        }
    }
}

/// Which branch produced the reply text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    Generated,
    Greeting,
    Apology,
}

impl ReplyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyOutcome::Generated => "generated",
            ReplyOutcome::Greeting => "greeting",
            ReplyOutcome::Apology => "apology",
        }
    }
}

#[derive(Debug)]
pub struct PlannedReply {
    pub outcome: ReplyOutcome,
    pub text: String,
    /// Set when the apology stands in for a failed completion.
    pub error: Option<BridgeError>,
}

/// Turns a raw mention into reply text. Never fails: the persona's canned
/// replies cover empty input and every completion error.
pub struct ReplyPlanner {
    provider: Arc<dyn LlmProvider>,
    persona: Persona,
    settings: CompletionSettings,
}

impl ReplyPlanner {
    pub fn new(provider: Arc<dyn LlmProvider>, persona: Persona, settings: CompletionSettings) -> Self {
        Self {
            provider,
            persona,
            settings,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn plan_reply(&self, raw_text: &str) -> PlannedReply {
        let message = strip_mentions(raw_text);
        if message.is_empty() {
            debug!("Mention without text, sending greeting");
            return PlannedReply {
                outcome: ReplyOutcome::Greeting,
                text: self.persona.greeting.clone(),
                error: None,
            };
        }

        match self.generate(&message).await {
            Ok(text) => PlannedReply {
                outcome: ReplyOutcome::Generated,
                text,
                error: None,
            },
            Err(e) => {
                warn!(provider = %self.provider.name(), error = %e, "Completion failed, sending apology");
                PlannedReply {
                    outcome: ReplyOutcome::Apology,
                    text: self.persona.apology.clone(),
                    error: Some(e),
                }
            }
        }
    }

    async fn generate(&self, message: &str) -> Result<String, BridgeError> {
        let request = LlmRequest {
            model: self.settings.model.clone(),
            prompt: self.persona.build_prompt(message),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let provider = self.provider.name().to_string();
        let response = tokio::time::timeout(self.settings.timeout, self.provider.complete(&request))
            .await
            .map_err(|_| BridgeError::CompletionTimeout(self.settings.timeout.as_secs()))?
            .map_err(|e| BridgeError::LlmError {
                provider: provider.clone(),
                message: format!("{e:#}"),
            })?;

        let content = response.content.trim();
        if content.is_empty() {
            return Err(BridgeError::LlmError {
                provider,
                message: "empty completion".to_string(),
            });
        }

        info!(
            provider = %response.provider,
            model = %response.model,
            latency_ms = response.latency_ms,
            "Completion generated"
        );
        Ok(content.to_string())
    }
}
