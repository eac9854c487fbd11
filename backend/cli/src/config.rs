use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use happychan_channels::slack_web::DEFAULT_SLACK_API_BASE_URL;
use happychan_channels::SlackConfig;
use happychan_planner::persona::{
    DEFAULT_APOLOGY, DEFAULT_BOT_NAME, DEFAULT_GREETING, DEFAULT_USER_LABEL,
};
use happychan_planner::providers::gemini::DEFAULT_GEMINI_BASE_URL;
use happychan_planner::{CompletionSettings, Persona};

/// happychan runtime configuration.
#[derive(Clone)]
pub struct Config {
    /// HTTP server bind address
    pub bind_address: String,
    /// HTTP server port
    pub port: u16,
    /// Log level
    pub log_level: String,
    /// Directory for rolling JSON logs; console only when unset
    pub log_dir: Option<PathBuf>,

    // Slack
    pub slack_bot_token: Option<String>,
    pub slack_signing_secret: Option<String>,
    pub slack_events_path: String,
    pub slack_api_base_url: String,
    pub slack_max_request_age_secs: u64,
    pub slack_handshake_requires_signature: bool,
    pub slack_ignore_retries: bool,
    pub slack_reply_in_thread: bool,
    pub slack_process_before_response: bool,

    // Gemini
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub completion_timeout_secs: u64,
    pub max_output_tokens: u32,
    pub temperature: f32,

    pub persona: Persona,
}

impl Default for Config {
    fn default() -> Self {
        let completion = CompletionSettings::default();
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_dir: None,
            slack_bot_token: None,
            slack_signing_secret: None,
            slack_events_path: "/api/slack".to_string(),
            slack_api_base_url: DEFAULT_SLACK_API_BASE_URL.to_string(),
            slack_max_request_age_secs: 300,
            slack_handshake_requires_signature: false,
            slack_ignore_retries: true,
            slack_reply_in_thread: true,
            slack_process_before_response: true,
            gemini_api_key: None,
            gemini_model: completion.model,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            completion_timeout_secs: completion.timeout.as_secs(),
            max_output_tokens: completion.max_tokens,
            temperature: completion.temperature,
            persona: Persona::default(),
        }
    }
}

// Secrets stay out of logs and panic messages.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn mask(v: &Option<String>) -> &'static str {
            if v.is_some() {
                "[REDACTED]"
            } else {
                "<unset>"
            }
        }
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("log_dir", &self.log_dir)
            .field("slack_bot_token", &mask(&self.slack_bot_token))
            .field("slack_signing_secret", &mask(&self.slack_signing_secret))
            .field("slack_events_path", &self.slack_events_path)
            .field("slack_api_base_url", &self.slack_api_base_url)
            .field("slack_max_request_age_secs", &self.slack_max_request_age_secs)
            .field(
                "slack_handshake_requires_signature",
                &self.slack_handshake_requires_signature,
            )
            .field("slack_ignore_retries", &self.slack_ignore_retries)
            .field("slack_reply_in_thread", &self.slack_reply_in_thread)
            .field(
                "slack_process_before_response",
                &self.slack_process_before_response,
            )
            .field("gemini_api_key", &mask(&self.gemini_api_key))
            .field("gemini_model", &self.gemini_model)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("completion_timeout_secs", &self.completion_timeout_secs)
            .field("bot_name", &self.persona.bot_name)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_map(&std::env::vars().collect())
    }

    /// Build configuration from an explicit variable map.
    pub fn from_map(env: &HashMap<String, String>) -> Result<Self> {
        let defaults = Self::default();
        let get = |key: &str| env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
        let string = |key: &str, default: String| get(key).map(str::to_string).unwrap_or(default);

        let persona_preamble = match (get("HAPPYCHAN_PERSONA"), get("HAPPYCHAN_PERSONA_FILE")) {
            (Some(text), _) => text.to_string(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read persona file {path}"))?,
            (None, None) => defaults.persona.preamble.clone(),
        };

        let config = Self {
            bind_address: string("HAPPYCHAN_BIND", defaults.bind_address),
            port: parse(env, &["HAPPYCHAN_PORT", "PORT"], defaults.port)?,
            log_level: string("RUST_LOG", defaults.log_level),
            log_dir: get("HAPPYCHAN_LOG_DIR").map(PathBuf::from),
            slack_bot_token: get("SLACK_BOT_TOKEN").map(str::to_string),
            slack_signing_secret: get("SLACK_SIGNING_SECRET").map(str::to_string),
            slack_events_path: string("SLACK_EVENTS_PATH", defaults.slack_events_path),
            slack_api_base_url: string("SLACK_API_BASE_URL", defaults.slack_api_base_url),
            slack_max_request_age_secs: parse(
                env,
                &["SLACK_MAX_REQUEST_AGE_SECS"],
                defaults.slack_max_request_age_secs,
            )?,
            slack_handshake_requires_signature: parse_bool(
                env,
                "SLACK_HANDSHAKE_REQUIRES_SIGNATURE",
                defaults.slack_handshake_requires_signature,
            )?,
            slack_ignore_retries: parse_bool(
                env,
                "SLACK_IGNORE_RETRIES",
                defaults.slack_ignore_retries,
            )?,
            slack_reply_in_thread: parse_bool(
                env,
                "SLACK_REPLY_IN_THREAD",
                defaults.slack_reply_in_thread,
            )?,
            slack_process_before_response: parse_bool(
                env,
                "SLACK_PROCESS_BEFORE_RESPONSE",
                defaults.slack_process_before_response,
            )?,
            gemini_api_key: get("GEMINI_API_KEY").map(str::to_string),
            gemini_model: string("GEMINI_MODEL", defaults.gemini_model),
            gemini_base_url: string("GEMINI_BASE_URL", defaults.gemini_base_url),
            completion_timeout_secs: parse(
                env,
                &["HAPPYCHAN_COMPLETION_TIMEOUT_SECS"],
                defaults.completion_timeout_secs,
            )?,
            max_output_tokens: parse(
                env,
                &["HAPPYCHAN_MAX_OUTPUT_TOKENS"],
                defaults.max_output_tokens,
            )?,
            temperature: parse(env, &["HAPPYCHAN_TEMPERATURE"], defaults.temperature)?,
            persona: Persona {
                preamble: persona_preamble,
                bot_name: string("HAPPYCHAN_BOT_NAME", DEFAULT_BOT_NAME.to_string()),
                user_label: string("HAPPYCHAN_USER_LABEL", DEFAULT_USER_LABEL.to_string()),
                greeting: string("HAPPYCHAN_GREETING", DEFAULT_GREETING.to_string()),
                apology: string("HAPPYCHAN_APOLOGY", DEFAULT_APOLOGY.to_string()),
            },
        };

        if !config.slack_events_path.starts_with('/') {
            bail!(
                "SLACK_EVENTS_PATH must start with '/': {}",
                config.slack_events_path
            );
        }
        if config.completion_timeout_secs == 0 {
            bail!("HAPPYCHAN_COMPLETION_TIMEOUT_SECS must be greater than zero");
        }

        Ok(config)
    }

    /// Problems that do not stop the server but break part of it.
    pub fn warnings(&self) -> Vec<&'static str> {
        let mut warnings = Vec::new();
        if self.slack_signing_secret.is_none() {
            warnings.push("SLACK_SIGNING_SECRET is not set: every event except the URL handshake will be rejected");
        }
        if self.slack_bot_token.is_none() {
            warnings.push("SLACK_BOT_TOKEN is not set: replies cannot be posted");
        }
        if self.gemini_api_key.is_none() {
            warnings.push("GEMINI_API_KEY is not set: every mention will get the apology reply");
        }
        warnings
    }

    pub fn slack_config(&self) -> SlackConfig {
        SlackConfig {
            signing_secret: self.slack_signing_secret.clone(),
            events_path: self.slack_events_path.clone(),
            service_name: self.persona.bot_name.clone(),
            max_request_age: Duration::from_secs(self.slack_max_request_age_secs),
            handshake_requires_signature: self.slack_handshake_requires_signature,
            ignore_retries: self.slack_ignore_retries,
            reply_in_thread: self.slack_reply_in_thread,
            process_before_response: self.slack_process_before_response,
        }
    }

    pub fn completion_settings(&self) -> CompletionSettings {
        CompletionSettings {
            model: self.gemini_model.clone(),
            max_tokens: self.max_output_tokens,
            temperature: self.temperature,
            timeout: Duration::from_secs(self.completion_timeout_secs),
        }
    }
}

/// First key present wins.
fn parse<T>(env: &HashMap<String, String>, keys: &[&str], default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    for key in keys {
        if let Some(raw) = env.get(*key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
            return raw
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid value for {key} ({raw}): {e}"));
        }
    }
    Ok(default)
}

fn parse_bool(env: &HashMap<String, String>, key: &str, default: bool) -> Result<bool> {
    match env.get(key).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => bail!("Invalid boolean for {key}: {other}"),
    }
}
