//! Trade fills and the queued events that carry them to the notifier.

use serde::{Deserialize, Serialize};

use super::enums::Side;

/// A single trade fill, kept as the raw JSON object received from the feed.
///
/// Accessors accept both string-encoded (`"50000.5"`) and native numeric
/// values and fall back to placeholders when a field is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeFill(pub serde_json::Value);

impl TradeFill {
    /// Whether the fill is a JSON object. Anything else is malformed.
    pub fn is_object(&self) -> bool {
        self.0.is_object()
    }

    /// Read a field as display text. Strings are returned as-is, numbers and
    /// booleans are rendered, everything else is treated as absent.
    pub fn field(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Traded coin, or `"UNKNOWN"`.
    pub fn coin(&self) -> String {
        self.field("coin").unwrap_or_else(|| "UNKNOWN".into())
    }

    /// Fill side.
    pub fn side(&self) -> Side {
        Side::from_code(&self.field("side").unwrap_or_default())
    }

    /// Fill price, or `"?"`.
    pub fn price(&self) -> String {
        self.field("px").unwrap_or_else(|| "?".into())
    }

    /// Fill size, or `"?"`.
    pub fn size(&self) -> String {
        self.field("sz").unwrap_or_else(|| "?".into())
    }

    /// Realized PnL attached to the fill, or `"0.0"`.
    pub fn closed_pnl(&self) -> String {
        self.field("closedPnl").unwrap_or_else(|| "0.0".into())
    }
}

/// One fill waiting in the event queue, paired with the address it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEvent {
    pub fill: TradeFill,
    pub user: String,
}

impl QueuedEvent {
    pub fn new(fill: TradeFill, user: impl Into<String>) -> Self {
        Self { fill, user: user.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accessors_read_strings_and_numbers() {
        let fill = TradeFill(json!({"coin": "BTC", "side": "B", "px": 50000.5, "sz": "0.1", "closedPnl": "12.5"}));
        assert_eq!(fill.coin(), "BTC");
        assert_eq!(fill.side(), Side::Buy);
        assert_eq!(fill.price(), "50000.5");
        assert_eq!(fill.size(), "0.1");
        assert_eq!(fill.closed_pnl(), "12.5");
    }

    #[test]
    fn missing_fields_use_placeholders() {
        let fill = TradeFill(json!({}));
        assert_eq!(fill.coin(), "UNKNOWN");
        assert_eq!(fill.side(), Side::Other(String::new()));
        assert_eq!(fill.price(), "?");
        assert_eq!(fill.size(), "?");
        assert_eq!(fill.closed_pnl(), "0.0");
    }

    #[test]
    fn non_object_fill() {
        assert!(!TradeFill(json!("garbage")).is_object());
        assert!(TradeFill(json!({"coin": "ETH"})).is_object());
    }
}
