//! Telegram Bot API transport.
//!
//! | Operation    | Method | Path                      |
//! |--------------|--------|---------------------------|
//! | Send message | POST   | `/bot{token}/sendMessage` |
//!
//! The bot token is part of the URL, so request errors are stripped of their
//! URL before they reach the logs.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use fw_core::config::TelegramConfig;
use tracing::{debug, warn};

use crate::error::{StatusClass, classify_status};
use crate::{DeliveryError, NotifyTransport};

/// Sends alerts to one Telegram chat.
pub struct TelegramTransport {
    /// Shared HTTP client (carries the request timeout).
    http: reqwest::Client,
    /// Fully-built `sendMessage` URL, token included.
    send_url: String,
    /// Target chat.
    chat_id: String,
}

impl TelegramTransport {
    /// Build a transport from config.
    ///
    /// Returns `Ok(None)` (and logs a warning) when the token or chat id is
    /// missing, in which case alerts cannot be sent.
    pub fn from_config(cfg: &TelegramConfig) -> Result<Option<Self>> {
        if !cfg.is_configured() {
            warn!("[telegram] bot token or chat id missing, alerts will not be sent");
            return Ok(None);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_sec))
            .build()
            .context("failed to build Telegram HTTP client")?;
        Ok(Some(Self {
            http,
            send_url: send_message_url(&cfg.api_url, cfg.bot_token.trim()),
            chat_id: cfg.chat_id.trim().to_string(),
        }))
    }

    /// JSON body of a `sendMessage` request.
    pub fn payload(&self, text: &str) -> serde_json::Value {
        serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        })
    }
}

#[async_trait]
impl NotifyTransport for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn deliver(&self, text: &str) -> Result<(), DeliveryError> {
        let resp = self
            .http
            .post(&self.send_url)
            .json(&self.payload(text))
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.without_url().to_string()))?;

        let status = resp.status().as_u16();
        if classify_status(status) == StatusClass::Success {
            debug!("[telegram] message delivered");
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        match DeliveryError::from_status(status, body) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// `{api_url}/bot{token}/sendMessage`, tolerating a trailing slash.
fn send_message_url(api_url: &str, token: &str) -> String {
    format!("{}/bot{token}/sendMessage", api_url.trim_end_matches('/'))
}
