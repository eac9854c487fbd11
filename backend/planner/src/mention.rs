use regex::Regex;
use std::sync::LazyLock;

/// `<@U123ABC>`: a user reference as it appears in raw message text.
static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<@[A-Z0-9]+>").unwrap());

/// Remove every user mention token from `text` and trim what is left.
pub fn strip_mentions(text: &str) -> String {
    MENTION_RE.replace_all(text, "").trim().to_string()
}
