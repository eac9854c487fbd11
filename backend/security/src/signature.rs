//! Slack request signing.
//!
//! Slack signs every request with `v0=hex(HMAC-SHA256(secret, "v0:{ts}:{body}"))`
//! and sends the result in `X-Slack-Signature` next to
//! `X-Slack-Request-Timestamp`. The body must be the exact bytes received,
//! before any JSON parsing.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_VERSION: &str = "v0";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("no signing secret configured")]
    MissingSecret,

    #[error("missing {0} header")]
    MissingHeader(&'static str),

    #[error("request timestamp is not a unix epoch: {0}")]
    MalformedTimestamp(String),

    #[error("request timestamp is {age_secs}s away from local time")]
    StaleTimestamp { age_secs: u64 },

    #[error("signature mismatch")]
    Mismatch,
}

fn signing_mac(secret: &str, timestamp: &str, body: &[u8]) -> Option<HmacSha256> {
    if secret.is_empty() {
        return None;
    }
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Some(mac)
}

/// Compute the `v0=` signature for a body. Returns `None` for an empty secret.
pub fn compute_signature(secret: &str, timestamp: &str, body: &[u8]) -> Option<String> {
    let mac = signing_mac(secret, timestamp, body)?;
    Some(format!(
        "{SIGNATURE_VERSION}={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Check a Slack signature. Fails closed when no secret is configured; a
/// missing `v0=` prefix, non-hex digits or a wrong length are all just `false`.
pub fn verify_signature(secret: Option<&str>, timestamp: &str, body: &[u8], signature: &str) -> bool {
    let Some(mac) = secret.and_then(|secret| signing_mac(secret, timestamp, body)) else {
        return false;
    };
    let Some(digest) = signature
        .strip_prefix(SIGNATURE_VERSION)
        .and_then(|rest| rest.strip_prefix('='))
    else {
        return false;
    };
    let Ok(digest) = hex::decode(digest) else {
        return false;
    };
    // verify_slice compares in constant time.
    mac.verify_slice(&digest).is_ok()
}

/// Everything needed to authenticate one inbound request.
#[derive(Debug, Clone, Copy)]
pub struct SignedRequest<'a> {
    pub body: &'a [u8],
    pub signature: Option<&'a str>,
    pub timestamp: Option<&'a str>,
}

impl<'a> SignedRequest<'a> {
    /// Verify the signature and, when `max_age` is non-zero, that the
    /// timestamp lies within `max_age` of `now`.
    pub fn verify(
        &self,
        secret: Option<&str>,
        max_age: Duration,
        now: SystemTime,
    ) -> Result<(), SignatureError> {
        let secret = secret
            .filter(|s| !s.is_empty())
            .ok_or(SignatureError::MissingSecret)?;
        let signature = self
            .signature
            .ok_or(SignatureError::MissingHeader(SIGNATURE_HEADER))?;
        let timestamp = self
            .timestamp
            .ok_or(SignatureError::MissingHeader(TIMESTAMP_HEADER))?;

        if !max_age.is_zero() {
            check_freshness(timestamp, max_age, now)?;
        }

        if verify_signature(Some(secret), timestamp, self.body, signature) {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

fn check_freshness(timestamp: &str, max_age: Duration, now: SystemTime) -> Result<(), SignatureError> {
    let sent: u64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::MalformedTimestamp(timestamp.to_string()))?;
    let now = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let age_secs = now.abs_diff(sent);
    if age_secs > max_age.as_secs() {
        return Err(SignatureError::StaleTimestamp { age_secs });
    }
    Ok(())
}
