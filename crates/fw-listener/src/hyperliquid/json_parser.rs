//! Hyperliquid WebSocket message parser.
//!
//! Inbound messages are envelopes routed by their `channel` field:
//!
//! - `subscriptionResponse`, `pong` → [`FeedMessage::Control`]
//! - `userFills` with `data.isSnapshot == true` → [`FeedMessage::Snapshot`]
//! - `userFills` otherwise → [`FeedMessage::Fills`]
//! - anything else → [`FeedMessage::Other`]

use fw_core::error::FwError;
use fw_core::{Topic, TradeFill};
use serde::Deserialize;

/// Placeholder user for fill messages that do not name one.
pub const UNKNOWN_USER: &str = "Unknown";

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// Protocol traffic (subscription acks, pongs).
    Control,
    /// Initial history replay sent right after subscribing.
    Snapshot { user: String, fills: usize },
    /// Live fills for one user.
    Fills { user: String, fills: Vec<TradeFill> },
    /// A channel this listener does not consume.
    Other { channel: String },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    channel: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct UserFillsData {
    #[serde(rename = "isSnapshot", default)]
    is_snapshot: bool,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    fills: Vec<TradeFill>,
}

/// Parse one inbound text frame.
pub fn parse_message(text: &str) -> Result<FeedMessage, FwError> {
    let env: Envelope = serde_json::from_str(text).map_err(|e| FwError::Parse(format!("invalid json: {e}")))?;

    match env.channel.as_str() {
        "subscriptionResponse" | "pong" => Ok(FeedMessage::Control),
        Topic::CHANNEL => {
            let data: UserFillsData = serde_json::from_value(env.data)
                .map_err(|e| FwError::Parse(format!("invalid {} payload: {e}", Topic::CHANNEL)))?;
            let user = data.user.unwrap_or_else(|| UNKNOWN_USER.to_string());
            if data.is_snapshot {
                Ok(FeedMessage::Snapshot { user, fills: data.fills.len() })
            } else {
                Ok(FeedMessage::Fills { user, fills: data.fills })
            }
        }
        _ => Ok(FeedMessage::Other { channel: env.channel }),
    }
}

/// Routing key of a `userFills` message: its lowercased `data.user`.
///
/// Returns `None` for other channels and for payloads that do not parse.
pub fn route_key(text: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(text).ok()?;
    if v.get("channel")?.as_str()? != Topic::CHANNEL {
        return None;
    }
    Some(v.get("data")?.get("user")?.as_str()?.to_ascii_lowercase())
}

/// `{"method":"subscribe","subscription":{...}}` for `topic`.
pub fn build_subscribe(topic: &Topic) -> String {
    serde_json::json!({ "method": "subscribe", "subscription": topic.subscription() }).to_string()
}

/// `{"method":"unsubscribe","subscription":{...}}` for `topic`.
pub fn build_unsubscribe(topic: &Topic) -> String {
    serde_json::json!({ "method": "unsubscribe", "subscription": topic.subscription() }).to_string()
}

/// Application-level keep-alive.
pub fn ping_payload() -> serde_json::Value {
    serde_json::json!({ "method": "ping" })
}
