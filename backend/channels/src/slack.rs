//! Slack channel adapter for happychan.
//!
//! Serves the Slack Events API webhook: answers the URL-verification
//! handshake, authenticates every other request with the signing secret, and
//! replies to `app_mention` events through the configured `ChatPoster`.
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::{
    body::Bytes,
    extract::{FromRequest, Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::any,
    Router,
};
use serde_json::{json, Value};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, instrument, warn};

use happychan_core::{ChatPoster, OutgoingMessage, SlackEnvelope};
use happychan_logging::{BridgeEvent, EventSink};
use happychan_planner::ReplyPlanner;
use happychan_security::{SignedRequest, SIGNATURE_HEADER, TIMESTAMP_HEADER};

use crate::http_error::{panic_response, ApiError};
use crate::slack_events::{classify, Disposition, IgnoreReason, Mention};
use crate::ChannelAdapter;

pub const RETRY_NUM_HEADER: &str = "x-slack-retry-num";
pub const RETRY_REASON_HEADER: &str = "x-slack-retry-reason";

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SlackConfig {
    /// Shared secret from the Slack app's "Basic Information" page. Without
    /// it every non-handshake request is rejected.
    pub signing_secret: Option<String>,
    pub events_path: String,
    /// Used in the liveness response: "<service_name> is running".
    pub service_name: String,
    /// Allowed distance between the request timestamp and local time. Zero
    /// disables the check.
    pub max_request_age: Duration,
    pub handshake_requires_signature: bool,
    /// Acknowledge Slack's redeliveries without answering the mention again.
    pub ignore_retries: bool,
    pub reply_in_thread: bool,
    /// Finish the reply before acknowledging. When off the reply runs in a
    /// background task and Slack gets its 200 immediately.
    pub process_before_response: bool,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            signing_secret: None,
            events_path: "/api/slack".to_string(),
            service_name: "happychan".to_string(),
            max_request_age: Duration::from_secs(300),
            handshake_requires_signature: false,
            ignore_retries: true,
            reply_in_thread: true,
            process_before_response: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Axum state
// ---------------------------------------------------------------------------

struct Inner {
    config: SlackConfig,
    planner: Arc<ReplyPlanner>,
    poster: Arc<dyn ChatPoster>,
    sink: Arc<dyn EventSink>,
}

#[derive(Clone)]
struct AppState(Arc<Inner>);

// ---------------------------------------------------------------------------
// Adapter struct
// ---------------------------------------------------------------------------

pub struct SlackAdapter {
    state: AppState,
}

impl SlackAdapter {
    pub fn new(
        config: SlackConfig,
        planner: Arc<ReplyPlanner>,
        poster: Arc<dyn ChatPoster>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            state: AppState(Arc::new(Inner {
                config,
                planner,
                poster,
                sink,
            })),
        }
    }

    pub fn config(&self) -> &SlackConfig {
        &self.state.0.config
    }
}

impl ChannelAdapter for SlackAdapter {
    fn name(&self) -> &str {
        "slack"
    }

    fn build_router(&self) -> Router {
        let path = self.config().events_path.as_str();
        let mut router = Router::new().route(path, any(handle_slack_request));
        if path != "/" {
            router = router.route("/", any(handle_slack_request));
        }
        router
            .with_state(self.state.clone())
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(cors_layer())
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// ---------------------------------------------------------------------------
// Webhook handler
// ---------------------------------------------------------------------------

/// Only POST reads the body; every other method answers without touching it.
async fn handle_slack_request(State(state): State<AppState>, request: Request) -> Response {
    match request.method().clone() {
        Method::OPTIONS => StatusCode::OK.into_response(),
        Method::GET => Json(json!({
            "status": format!("{} is running", state.0.config.service_name)
        }))
        .into_response(),
        Method::POST => {
            let headers = request.headers().clone();
            let body = match Bytes::from_request(request, &state).await {
                Ok(body) => body,
                Err(rejection) => {
                    warn!(error = %rejection, "[Slack] Could not read request body");
                    return rejection.into_response();
                }
            };
            match handle_event_post(&state, &headers, body).await {
                Ok(json) => json.into_response(),
                Err(err) => err.into_response(),
            }
        }
        _ => ApiError::MethodNotAllowed.into_response(),
    }
}

async fn handle_event_post(
    state: &AppState,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let inner = &state.0;

    // Unparseable bodies fall through to the no-op acknowledgement.
    let envelope: SlackEnvelope = serde_json::from_slice(&body).unwrap_or_else(|err| {
        debug!(error = %err, "[Slack] Body is not an event envelope");
        SlackEnvelope::default()
    });

    // 1. Handshake precedes authentication unless configured otherwise.
    if envelope.is_url_verification() && !inner.config.handshake_requires_signature {
        return Ok(handshake(inner, envelope.challenge.unwrap_or(Value::Null)));
    }

    // 2. Everything else must be signed by Slack.
    authenticate(inner, headers, &body)?;

    // 3. Redeliveries were already handled (or are being handled).
    if inner.config.ignore_retries {
        if let Some(num) = header_str(headers, RETRY_NUM_HEADER) {
            let reason = IgnoreReason::Retry(num.to_string());
            info!(
                retry_num = num,
                retry_reason = header_str(headers, RETRY_REASON_HEADER).unwrap_or(""),
                "[Slack] Ignoring redelivery"
            );
            inner.sink.record(BridgeEvent::Ignored {
                reason: reason.describe(),
            });
            return Ok(ack());
        }
    }

    match classify(envelope) {
        Disposition::Handshake(challenge) => Ok(handshake(inner, challenge)),
        Disposition::Ignore(reason) => {
            debug!(reason = %reason.describe(), "[Slack] Ignoring event");
            inner.sink.record(BridgeEvent::Ignored {
                reason: reason.describe(),
            });
            Ok(ack())
        }
        Disposition::Mention(mention) => {
            if inner.config.process_before_response {
                reply_to_mention(inner, mention).await;
            } else {
                let state = state.clone();
                tokio::spawn(async move {
                    reply_to_mention(&state.0, mention).await;
                });
            }
            Ok(ack())
        }
        Disposition::Default => Ok(ack()),
    }
}

fn ack() -> Json<Value> {
    Json(json!({ "ok": true }))
}

fn handshake(inner: &Inner, challenge: Value) -> Json<Value> {
    info!("[Slack] URL verification challenge received");
    inner.sink.record(BridgeEvent::Handshake);
    Json(json!({ "challenge": challenge }))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn authenticate(inner: &Inner, headers: &HeaderMap, body: &[u8]) -> Result<(), ApiError> {
    let request = SignedRequest {
        body,
        signature: header_str(headers, SIGNATURE_HEADER),
        timestamp: header_str(headers, TIMESTAMP_HEADER),
    };
    request
        .verify(
            inner.config.signing_secret.as_deref(),
            inner.config.max_request_age,
            SystemTime::now(),
        )
        .map_err(|err| {
            warn!(error = %err, "[Slack] Rejecting webhook");
            inner.sink.record(BridgeEvent::RequestRejected {
                reason: err.to_string(),
            });
            ApiError::InvalidSignature
        })
}

/// Plan a reply and post it. Failures end here: they are logged and
/// reported to the sink, never surfaced to Slack.
#[instrument(
    name = "slack_mention",
    skip_all,
    fields(event_id = ?mention.event_id, team_id = ?mention.team_id)
)]
async fn reply_to_mention(inner: &Inner, mention: Mention) {
    let Mention { event, event_id, .. } = mention;
    let Some(channel) = event.channel.clone() else {
        return;
    };
    let text = event.text.as_deref().unwrap_or_default();

    info!(channel = %channel, user = ?event.user, "[Slack] App mention received");
    inner.sink.record(BridgeEvent::MentionReceived {
        channel: channel.clone(),
        user: event.user.clone(),
        event_id,
        text: text.to_string(),
    });

    let reply = inner.planner.plan_reply(text).await;
    if let Some(err) = &reply.error {
        inner.sink.record(BridgeEvent::CompletionFailed {
            provider: inner.planner.provider_name().to_string(),
            error_msg: err.to_string(),
        });
    }

    let mut message = OutgoingMessage::new(channel.clone(), reply.text);
    if inner.config.reply_in_thread {
        if let Some(anchor) = event.thread_anchor() {
            message = message.in_thread(anchor);
        }
    }

    match inner.poster.post_message(&message).await {
        Ok(()) => inner.sink.record(BridgeEvent::ReplyPosted {
            channel,
            thread_ts: message.thread_ts.clone(),
            outcome: reply.outcome.as_str().to_string(),
        }),
        Err(err) => {
            error!(channel = %channel, error = %err, "[Slack] Failed to post reply");
            inner.sink.record(BridgeEvent::PostFailed {
                channel,
                error_msg: format!("{err:#}"),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::UNIX_EPOCH;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use happychan_logging::MemorySink;
    use happychan_planner::persona::{DEFAULT_APOLOGY, DEFAULT_GREETING};
    use happychan_planner::providers::MockProvider;
    use happychan_planner::{CompletionSettings, Persona};
    use happychan_security::compute_signature;

    const SECRET: &str = "test-signing-secret";

    #[derive(Default)]
    struct RecordingPoster {
        sent: Mutex<Vec<OutgoingMessage>>,
        fail: bool,
    }

    impl RecordingPoster {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn sent(&self) -> Vec<OutgoingMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatPoster for RecordingPoster {
        async fn post_message(&self, message: &OutgoingMessage) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(message.clone());
            if self.fail {
                anyhow::bail!("channel_not_found");
            }
            Ok(())
        }
    }

    struct PanickingPoster;

    #[async_trait]
    impl ChatPoster for PanickingPoster {
        async fn post_message(&self, _message: &OutgoingMessage) -> anyhow::Result<()> {
            panic!("poster exploded");
        }
    }

    struct Harness {
        router: Router,
        poster: Arc<RecordingPoster>,
        provider: Arc<MockProvider>,
        sink: Arc<MemorySink>,
    }

    fn test_config() -> SlackConfig {
        SlackConfig {
            signing_secret: Some(SECRET.to_string()),
            ..SlackConfig::default()
        }
    }

    fn harness_with(config: SlackConfig, provider: MockProvider, poster: RecordingPoster) -> Harness {
        let provider = Arc::new(provider);
        let poster = Arc::new(poster);
        let sink = Arc::new(MemorySink::new());
        let planner = Arc::new(ReplyPlanner::new(
            provider.clone(),
            Persona::default(),
            CompletionSettings::default(),
        ));
        let adapter = SlackAdapter::new(config, planner, poster.clone(), sink.clone());
        Harness {
            router: adapter.build_router(),
            poster,
            provider,
            sink,
        }
    }

    fn harness() -> Harness {
        harness_with(
            test_config(),
            MockProvider::new("mock").with_response("AI says hi"),
            RecordingPoster::default(),
        )
    }

    fn now_ts() -> String {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            .to_string()
    }

    fn signed_post(body: &str) -> Request<Body> {
        let ts = now_ts();
        let sig = compute_signature(SECRET, &ts, body.as_bytes()).unwrap();
        Request::builder()
            .method("POST")
            .uri("/api/slack")
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, sig)
            .header(TIMESTAMP_HEADER, ts)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn unsigned_post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/slack")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Bytes) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body)
    }

    fn as_json(bytes: &Bytes) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    fn mention_body(text: &str) -> String {
        json!({
            "type": "event_callback",
            "team_id": "T1",
            "event_id": "Ev0123",
            "event": {
                "type": "app_mention",
                "user": "U999",
                "text": text,
                "channel": "C42",
                "ts": "1700000000.000100"
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn options_is_empty_200() {
        let h = harness();
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/slack")
            .header(SIGNATURE_HEADER, "v0=garbage")
            .body(Body::from("{\"type\":\"url_verification\"}"))
            .unwrap();
        let (status, body) = send(&h.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn cors_preflight_allows_any_origin() {
        let h = harness();
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/slack")
            .header("origin", "https://example.com")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = h.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn get_reports_liveness() {
        let h = harness();
        for uri in ["/api/slack", "/"] {
            let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
            let (status, body) = send(&h.router, request).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(as_json(&body), json!({"status": "happychan is running"}));
        }
    }

    #[tokio::test]
    async fn other_methods_are_405() {
        let h = harness();
        for method in ["PUT", "DELETE", "PATCH"] {
            let request = Request::builder()
                .method(method)
                .uri("/api/slack")
                .body(Body::empty())
                .unwrap();
            let (status, body) = send(&h.router, request).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(as_json(&body), json!({"error": "Method not allowed"}));
        }
    }

    #[tokio::test]
    async fn oversized_bodies_do_not_mask_method_checks() {
        let h = harness();
        let big = vec![b'x'; 3 * 1024 * 1024];

        let request = Request::builder()
            .method("DELETE")
            .uri("/api/slack")
            .body(Body::from(big.clone()))
            .unwrap();
        let (status, body) = send(&h.router, request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(as_json(&body), json!({"error": "Method not allowed"}));

        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/slack")
            .body(Body::from(big.clone()))
            .unwrap();
        let (status, body) = send(&h.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());

        let (status, _) = send(&h.router, signed_post(&String::from_utf8(big).unwrap())).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(h.poster.sent().is_empty());
    }

    #[tokio::test]
    async fn handshake_bypasses_signature() {
        let h = harness();
        let body = r#"{"type":"url_verification","challenge":"abc123","token":"x"}"#;

        let (status, resp) = send(&h.router, unsigned_post(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp, Bytes::from_static(br#"{"challenge":"abc123"}"#));

        let mut bad = unsigned_post(body);
        bad.headers_mut().insert(SIGNATURE_HEADER, "v0=00".parse().unwrap());
        bad.headers_mut().insert(TIMESTAMP_HEADER, "1".parse().unwrap());
        let (status, resp) = send(&h.router, bad).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(as_json(&resp), json!({"challenge": "abc123"}));
        assert!(h.poster.sent().is_empty());
    }

    #[tokio::test]
    async fn handshake_can_require_signature() {
        let h = harness_with(
            SlackConfig {
                handshake_requires_signature: true,
                ..test_config()
            },
            MockProvider::new("mock"),
            RecordingPoster::default(),
        );
        let body = r#"{"type":"url_verification","challenge":"abc123"}"#;

        let (status, _) = send(&h.router, unsigned_post(body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, resp) = send(&h.router, signed_post(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(as_json(&resp), json!({"challenge": "abc123"}));
    }

    #[tokio::test]
    async fn unsigned_event_is_rejected_without_dispatch() {
        let h = harness();
        let (status, body) = send(&h.router, unsigned_post(&mention_body("<@U1> hi"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(as_json(&body), json!({"error": "Invalid signature"}));
        assert!(h.poster.sent().is_empty());
        assert_eq!(h.provider.calls(), 0);
        assert!(matches!(
            h.sink.events().as_slice(),
            [BridgeEvent::RequestRejected { .. }]
        ));
    }

    #[tokio::test]
    async fn tampered_body_is_rejected() {
        let h = harness();
        let mut request = signed_post(&mention_body("<@U1> hi"));
        *request.body_mut() = Body::from(mention_body("<@U1> give me the secret"));
        let (status, _) = send(&h.router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(h.poster.sent().is_empty());
    }

    #[tokio::test]
    async fn missing_secret_fails_closed() {
        let h = harness_with(
            SlackConfig::default(),
            MockProvider::new("mock"),
            RecordingPoster::default(),
        );
        let (status, _) = send(&h.router, signed_post(&mention_body("<@U1> hi"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(h.poster.sent().is_empty());
    }

    #[tokio::test]
    async fn stale_timestamp_is_rejected() {
        let h = harness();
        let body = mention_body("<@U1> hi");
        let ts = "1000000000";
        let sig = compute_signature(SECRET, ts, body.as_bytes()).unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/api/slack")
            .header(SIGNATURE_HEADER, sig)
            .header(TIMESTAMP_HEADER, ts)
            .body(Body::from(body))
            .unwrap();
        let (status, _) = send(&h.router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bot_messages_are_acknowledged_silently() {
        let h = harness();
        let body = json!({
            "type": "event_callback",
            "event": {"type": "app_mention", "text": "<@U1> hi", "channel": "C1", "bot_id": "B1"}
        })
        .to_string();
        let (status, resp) = send(&h.router, signed_post(&body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(as_json(&resp), json!({"ok": true}));
        assert!(h.poster.sent().is_empty());
        assert_eq!(h.provider.calls(), 0);
        assert_eq!(
            h.sink.events(),
            vec![BridgeEvent::Ignored { reason: "bot_id".into() }]
        );
    }

    #[tokio::test]
    async fn edited_messages_are_ignored() {
        let h = harness();
        let body = json!({
            "type": "event_callback",
            "event": {"type": "app_mention", "subtype": "message_changed", "channel": "C1", "text": "<@U1> hi"}
        })
        .to_string();
        let (status, _) = send(&h.router, signed_post(&body)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(h.poster.sent().is_empty());
    }

    #[tokio::test]
    async fn mention_is_answered_in_thread() {
        let h = harness();
        let (status, resp) = send(&h.router, signed_post(&mention_body("<@U123ABC> hello there"))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(as_json(&resp), json!({"ok": true}));
        assert_eq!(
            h.poster.sent(),
            vec![OutgoingMessage::new("C42", "AI says hi").in_thread("1700000000.000100")]
        );
        let prompts = h.provider.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].ends_with(": hello there\nhappychan:"));
        assert_eq!(
            h.sink.events(),
            vec![
                BridgeEvent::MentionReceived {
                    channel: "C42".into(),
                    user: Some("U999".into()),
                    event_id: Some("Ev0123".into()),
                    text: "<@U123ABC> hello there".into(),
                },
                BridgeEvent::ReplyPosted {
                    channel: "C42".into(),
                    thread_ts: Some("1700000000.000100".into()),
                    outcome: "generated".into(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn reply_in_thread_can_be_disabled() {
        let h = harness_with(
            SlackConfig {
                reply_in_thread: false,
                ..test_config()
            },
            MockProvider::new("mock").with_response("hey"),
            RecordingPoster::default(),
        );
        send(&h.router, signed_post(&mention_body("<@U1> yo"))).await;
        assert_eq!(h.poster.sent(), vec![OutgoingMessage::new("C42", "hey")]);
    }

    #[tokio::test]
    async fn bare_mention_gets_greeting_without_completion() {
        let h = harness();
        let (status, _) = send(&h.router, signed_post(&mention_body("<@U123ABC>"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(h.provider.calls(), 0);
        let sent = h.poster.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, DEFAULT_GREETING);
    }

    #[tokio::test]
    async fn completion_failure_posts_apology() {
        let h = harness_with(
            test_config(),
            MockProvider::failing("mock", "quota exceeded"),
            RecordingPoster::default(),
        );
        let (status, resp) = send(&h.router, signed_post(&mention_body("<@U1> hi"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(as_json(&resp), json!({"ok": true}));
        let sent = h.poster.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, DEFAULT_APOLOGY);
        assert!(h
            .sink
            .events()
            .iter()
            .any(|e| matches!(e, BridgeEvent::CompletionFailed { .. })));
    }

    #[tokio::test]
    async fn post_failure_still_acknowledges() {
        let h = harness_with(
            test_config(),
            MockProvider::new("mock").with_response("hi"),
            RecordingPoster::failing(),
        );
        let (status, resp) = send(&h.router, signed_post(&mention_body("<@U1> hi"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(as_json(&resp), json!({"ok": true}));
        assert!(h.sink.events().iter().any(|e| matches!(
            e,
            BridgeEvent::PostFailed { channel, .. } if channel == "C42"
        )));
    }

    #[tokio::test]
    async fn retries_are_not_answered_twice() {
        let h = harness();
        let mut request = signed_post(&mention_body("<@U1> hi"));
        request.headers_mut().insert(RETRY_NUM_HEADER, "1".parse().unwrap());
        request
            .headers_mut()
            .insert(RETRY_REASON_HEADER, "http_timeout".parse().unwrap());
        let (status, resp) = send(&h.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(as_json(&resp), json!({"ok": true}));
        assert!(h.poster.sent().is_empty());
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_body_is_a_noop() {
        let h = harness();
        for body in ["not json", "[]", r#"{"type":"event_callback","event":"oops"}"#] {
            let (status, resp) = send(&h.router, signed_post(body)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(as_json(&resp), json!({"ok": true}));
        }
        assert!(h.poster.sent().is_empty());
    }

    #[tokio::test]
    async fn background_mode_replies_after_ack() {
        let h = harness_with(
            SlackConfig {
                process_before_response: false,
                ..test_config()
            },
            MockProvider::new("mock").with_response("later"),
            RecordingPoster::default(),
        );
        let (status, _) = send(&h.router, signed_post(&mention_body("<@U1> hi"))).await;
        assert_eq!(status, StatusCode::OK);

        for _ in 0..100 {
            if !h.poster.sent().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(h.poster.sent().len(), 1);
    }

    #[tokio::test]
    async fn panic_during_dispatch_is_500() {
        let sink = Arc::new(MemorySink::new());
        let planner = Arc::new(ReplyPlanner::new(
            Arc::new(MockProvider::new("mock")),
            Persona::default(),
            CompletionSettings::default(),
        ));
        let router = SlackAdapter::new(test_config(), planner, Arc::new(PanickingPoster), sink)
            .build_router();

        let (status, body) = send(&router, signed_post(&mention_body("<@U1> hi"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body = as_json(&body);
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["details"], "poster exploded");
    }
}
