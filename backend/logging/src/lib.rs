//! Structured logging for happychan.
//!
//! Handles subscriber setup, secret redaction, and the `EventSink` through
//! which the webhook handler reports what it did with each request.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{BridgeEvent, EventLogEntry, EventSink, MemorySink, TracingSink};
pub use logger::{init_logger, LogGuard};
pub use redact::redact_sensitive_data;
