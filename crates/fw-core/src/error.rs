//! Typed error definitions for the fillwatch system.
//!
//! Provides [`FwError`] for domain-specific errors that are more informative
//! than plain `anyhow::Error` strings. All variants implement `std::error::Error`
//! via `thiserror`, so they integrate seamlessly with `anyhow::Result`.

use thiserror::Error;

/// Domain-specific errors for the fillwatch system.
#[derive(Debug, Error)]
pub enum FwError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// WebSocket connection, handshake, or communication error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Inbound feed message parsing error.
    #[error("parse error: {0}")]
    Parse(String),

    /// Feed subscription bookkeeping error (subscribe / unsubscribe).
    #[error("feed error: {0}")]
    Feed(String),
}
