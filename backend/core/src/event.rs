use serde::Deserialize;
use serde_json::Value;

/// Envelope `type` of the one-time endpoint ownership handshake.
pub const ENVELOPE_URL_VERIFICATION: &str = "url_verification";
/// Envelope `type` wrapping a workspace event.
pub const ENVELOPE_EVENT_CALLBACK: &str = "event_callback";

/// Top-level payload from the Slack Events API.
///
/// Every field is optional so that unexpected shapes still deserialize and
/// fall through to the no-op branch instead of failing the request.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct SlackEnvelope {
    #[serde(rename = "type", default)]
    pub envelope_type: Option<String>,
    /// Present on `url_verification`. Echoed back untouched.
    #[serde(default)]
    pub challenge: Option<Value>,
    /// Present on `event_callback`.
    #[serde(default)]
    pub event: Option<SlackEvent>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
}

impl SlackEnvelope {
    pub fn is_url_verification(&self) -> bool {
        self.envelope_type.as_deref() == Some(ENVELOPE_URL_VERIFICATION)
    }

    pub fn is_event_callback(&self) -> bool {
        self.envelope_type.as_deref() == Some(ENVELOPE_EVENT_CALLBACK)
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SlackEvent {
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    /// Parent message timestamp when the event happened inside a thread.
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    /// Set on messages authored by a bot, including our own replies.
    #[serde(default)]
    pub bot_id: Option<String>,
    /// Set on edits, deletions, joins and other non-plain messages.
    #[serde(default)]
    pub subtype: Option<String>,
}

impl SlackEvent {
    /// Machine-generated or edited events must never trigger a reply.
    pub fn is_ignorable(&self) -> bool {
        self.bot_id.is_some() || self.subtype.is_some()
    }

    /// Timestamp a reply should thread under: the thread parent when the
    /// event is already inside a thread, otherwise the event itself.
    pub fn thread_anchor(&self) -> Option<&str> {
        self.thread_ts.as_deref().or(self.ts.as_deref())
    }
}
