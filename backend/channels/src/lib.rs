pub mod http_error;
pub mod slack;
pub mod slack_events;
pub mod slack_web;

pub use http_error::ApiError;
pub use slack::{SlackAdapter, SlackConfig};
pub use slack_events::{classify, Disposition, IgnoreReason, Mention};
pub use slack_web::SlackWebClient;

/// All channel adapters implement this trait.
pub trait ChannelAdapter: Send + Sync {
    /// Human-readable adapter name for logging.
    fn name(&self) -> &str;

    /// Axum sub-router serving the adapter's inbound webhook endpoints.
    fn build_router(&self) -> axum::Router;
}
