//! Slack Events API
//!
//! One-shot classification of a parsed envelope into what the handler does
//! with it.

use serde_json::Value;

use happychan_core::{SlackEnvelope, SlackEvent};

pub const APP_MENTION: &str = "app_mention";

#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Echo the challenge back.
    Handshake(Value),
    /// Acknowledge and do nothing.
    Ignore(IgnoreReason),
    /// Answer the mention in its channel.
    Mention(Mention),
    /// Anything else: acknowledge and do nothing.
    Default,
}

/// An `app_mention` plus the envelope ids that identify its delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Mention {
    pub event: SlackEvent,
    pub event_id: Option<String>,
    pub team_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    BotMessage,
    Subtype(String),
    Retry(String),
}

impl IgnoreReason {
    fn for_event(event: &SlackEvent) -> Self {
        match &event.subtype {
            Some(subtype) if event.bot_id.is_none() => IgnoreReason::Subtype(subtype.clone()),
            _ => IgnoreReason::BotMessage,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            IgnoreReason::BotMessage => "bot_id".to_string(),
            IgnoreReason::Subtype(subtype) => format!("subtype:{subtype}"),
            IgnoreReason::Retry(num) => format!("retry:{num}"),
        }
    }
}

pub fn classify(envelope: SlackEnvelope) -> Disposition {
    if envelope.is_url_verification() {
        return Disposition::Handshake(envelope.challenge.unwrap_or(Value::Null));
    }
    if !envelope.is_event_callback() {
        return Disposition::Default;
    }
    let Some(event) = envelope.event else {
        return Disposition::Default;
    };

    if event.is_ignorable() {
        return Disposition::Ignore(IgnoreReason::for_event(&event));
    }

    if event.event_type == APP_MENTION && event.channel.is_some() {
        Disposition::Mention(Mention {
            event,
            event_id: envelope.event_id,
            team_id: envelope.team_id,
        })
    } else {
        Disposition::Default
    }
}
