//! User address helpers.
//!
//! Addresses are printed in logs and alerts in a shortened `0x1234...abcd`
//! form. The full value is only used on the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of leading characters kept by [`short_address`].
pub const SHORT_HEAD: usize = 6;

/// Number of trailing characters kept by [`short_address`].
pub const SHORT_TAIL: usize = 4;

/// Shorten an address to `head...tail` for display.
///
/// Addresses that are already short enough are returned unchanged, and an
/// empty address renders as `"N/A"`.
pub fn short_address(addr: &str) -> String {
    let count = addr.chars().count();
    if count == 0 {
        return "N/A".to_string();
    }
    if count <= SHORT_HEAD + SHORT_TAIL {
        return addr.to_string();
    }
    let head: String = addr.chars().take(SHORT_HEAD).collect();
    let tail: String = addr.chars().skip(count - SHORT_TAIL).collect();
    format!("{head}...{tail}")
}

/// A subscription target: one user address on the `userFills` channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic {
    user: String,
}

impl Topic {
    /// Channel name every topic subscribes to.
    pub const CHANNEL: &'static str = "userFills";

    /// Build a topic from a raw address. Surrounding whitespace is trimmed.
    pub fn new(user: impl AsRef<str>) -> Self {
        Self { user: user.as_ref().trim().to_string() }
    }

    /// The full address as configured.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Lowercased address, used to match inbound messages to subscriptions.
    pub fn key(&self) -> String {
        self.user.to_ascii_lowercase()
    }

    /// Shortened address for logs.
    pub fn short(&self) -> String {
        short_address(&self.user)
    }

    /// The subscription object sent to the feed.
    pub fn subscription(&self) -> serde_json::Value {
        serde_json::json!({ "type": Self::CHANNEL, "user": self.user })
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

/// Parse a comma-separated address list, dropping empty entries and
/// duplicates (first occurrence wins).
pub fn parse_topics(list: &str) -> Vec<Topic> {
    let mut topics: Vec<Topic> = Vec::new();
    for raw in list.split(',') {
        let topic = Topic::new(raw);
        if topic.user().is_empty() || topics.iter().any(|t| t.key() == topic.key()) {
            continue;
        }
        topics.push(topic);
    }
    topics
}
