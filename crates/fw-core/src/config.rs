//! Configuration parsing for the fillwatch system.
//!
//! Settings come from an optional JSON file. Every section and field has a
//! default, so an empty object is a valid config. Credentials and the list of
//! watched addresses can also be supplied through the environment, which
//! takes precedence over the file.
//!
//! # Example config
//!
//! ```json
//! {
//!   "service": { "module_name": "fillwatch", "log_path": "/tmp/log" },
//!   "feed": { "users": ["0x1234..."], "ping_interval_sec": 50 },
//!   "listener": { "heartbeat_timeout_sec": 90, "max_reconnect_attempts": 10 },
//!   "telegram": { "bot_token": "123:abc", "chat_id": "-100123" }
//! }
//! ```
//!
//! # Environment overrides
//!
//! | Variable             | Field                  |
//! |----------------------|------------------------|
//! | `USERS_LISTENED`     | `feed.users` (comma-separated) |
//! | `HYPERLIQUID_WS_URL` | `feed.ws_url`          |
//! | `TELEGRAM_BOT_TOKEN` | `telegram.bot_token`   |
//! | `TELEGRAM_CHAT_ID`   | `telegram.chat_id`     |

use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::types::{Topic, parse_topics};

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Module metadata (name, log path).
    pub service: ServiceMeta,
    /// Streaming feed connection settings.
    pub feed: FeedConfig,
    /// Listener timing and retry bounds.
    pub listener: ListenerConfig,
    /// Telegram notification settings.
    pub telegram: TelegramConfig,
}

/// Module metadata block.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceMeta {
    pub module_name: String,
    pub log_path: Option<String>,
    /// Emit JSON log lines.
    pub log_json: bool,
}

impl Default for ServiceMeta {
    fn default() -> Self {
        Self { module_name: "fillwatch".into(), log_path: None, log_json: false }
    }
}

/// Streaming feed settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// WebSocket endpoint.
    pub ws_url: String,
    /// Addresses whose fills are watched.
    pub users: Vec<String>,
    /// Application-level ping interval in seconds.
    pub ping_interval_sec: u64,
    /// Timeout for the WebSocket handshake in seconds.
    pub connect_timeout_sec: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://api.hyperliquid.xyz/ws".into(),
            users: Vec::new(),
            ping_interval_sec: 50,
            connect_timeout_sec: 10,
        }
    }
}

impl FeedConfig {
    /// Configured addresses as topics, blanks and duplicates removed.
    pub fn topics(&self) -> Vec<Topic> {
        parse_topics(&self.users.join(","))
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_sec)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_sec)
    }
}

/// Listener timing, reconnection bounds, and queue polling.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Seconds between heartbeat checks.
    pub heartbeat_interval_sec: u64,
    /// Silence after which the connection is considered stale.
    pub heartbeat_timeout_sec: u64,
    /// Delay before the first reconnect attempt.
    pub reconnect_initial_delay_sec: u64,
    /// Ceiling for the exponential reconnect delay.
    pub reconnect_max_delay_sec: u64,
    /// Consecutive failed reconnects before the listener gives up.
    pub max_reconnect_attempts: u32,
    /// How long the delivery worker blocks on an empty queue.
    pub queue_poll_timeout_ms: u64,
    /// Poll interval of the supervisory loop.
    pub supervisor_poll_ms: u64,
    /// Grace period for draining queued events at shutdown (0 = drop them).
    pub shutdown_drain_ms: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_sec: 30,
            heartbeat_timeout_sec: 90,
            reconnect_initial_delay_sec: 1,
            reconnect_max_delay_sec: 60,
            max_reconnect_attempts: 10,
            queue_poll_timeout_ms: 1_000,
            supervisor_poll_ms: 1_000,
            shutdown_drain_ms: 0,
        }
    }
}

impl ListenerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_sec)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_sec)
    }

    pub fn reconnect_initial_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_initial_delay_sec)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_max_delay_sec)
    }

    pub fn queue_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_poll_timeout_ms)
    }

    pub fn supervisor_poll(&self) -> Duration {
        Duration::from_millis(self.supervisor_poll_ms)
    }

    pub fn shutdown_drain(&self) -> Duration {
        Duration::from_millis(self.shutdown_drain_ms)
    }
}

/// Telegram bot settings. Missing credentials disable delivery.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    /// Bot API base URL.
    pub api_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_sec: u64,
    /// Delivery attempts per message, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub retry_initial_delay_ms: u64,
    /// Ceiling for the retry delay, in milliseconds.
    pub retry_max_delay_ms: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_url: "https://api.telegram.org".into(),
            request_timeout_sec: 5,
            max_attempts: 3,
            retry_initial_delay_ms: 500,
            retry_max_delay_ms: 5_000,
        }
    }
}

impl TelegramConfig {
    /// Whether both the token and the chat id are set.
    pub fn is_configured(&self) -> bool {
        !self.bot_token.trim().is_empty() && !self.chat_id.trim().is_empty()
    }
}

impl AppConfig {
    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Empty values are ignored so that a blank variable does not erase a
    /// value from the file.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(users) = get("USERS_LISTENED") {
            self.feed.users = users.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Some(url) = get("HYPERLIQUID_WS_URL") {
            self.feed.ws_url = url;
        }
        if let Some(token) = get("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Some(chat) = get("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = chat;
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }
}

/// Parse a JSON config document.
pub fn parse_config(content: &str) -> anyhow::Result<AppConfig> {
    let config: AppConfig = serde_json::from_str(content).context("invalid config JSON")?;
    Ok(config)
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("cannot read config {}", path.display()))?;
    parse_config(&content)
}
