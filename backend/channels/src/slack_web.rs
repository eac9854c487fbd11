//! Slack Web API client (`chat.postMessage`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info};

use happychan_core::{ChatPoster, OutgoingMessage};

pub const DEFAULT_SLACK_API_BASE_URL: &str = "https://slack.com/api";

pub struct SlackWebClient {
    http_client: Client,
    bot_token: String,
    base_url: String,
}

/// Slack answers 200 even on failure; `ok` carries the verdict.
#[derive(Deserialize, Debug)]
struct SlackApiResponse {
    ok: bool,
    error: Option<String>,
}

impl SlackApiResponse {
    fn into_result(self) -> Result<()> {
        if self.ok {
            Ok(())
        } else {
            anyhow::bail!(
                "Slack API error: {}",
                self.error.as_deref().unwrap_or("unknown_error")
            )
        }
    }
}

impl SlackWebClient {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            bot_token: bot_token.into(),
            base_url: DEFAULT_SLACK_API_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ChatPoster for SlackWebClient {
    async fn post_message(&self, message: &OutgoingMessage) -> Result<()> {
        let url = format!("{}/chat.postMessage", self.base_url);
        let res = self
            .http_client
            .post(&url)
            .bearer_auth(&self.bot_token)
            .json(message)
            .send()
            .await
            .context("chat.postMessage request failed")?;

        let status = res.status();
        if !status.is_success() {
            let err = res.text().await.unwrap_or_default();
            error!(status = %status, "[Slack] chat.postMessage failed: {}", err);
            anyhow::bail!("Slack send failed ({}): {}", status, err);
        }

        let body: SlackApiResponse = res
            .json()
            .await
            .context("Failed to parse chat.postMessage response")?;
        body.into_result()?;

        info!(channel = %message.channel, thread_ts = ?message.thread_ts, "[Slack] Sent message");
        Ok(())
    }
}
