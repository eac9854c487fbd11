//! Inbound request authentication for Slack webhooks.

pub mod signature;

pub use signature::{
    compute_signature, verify_signature, SignatureError, SignedRequest,
    SIGNATURE_HEADER, SIGNATURE_VERSION, TIMESTAMP_HEADER,
};
