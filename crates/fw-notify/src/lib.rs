//! # fw-notify
//!
//! Notification delivery for trade fills.
//!
//! A [`NotificationSink`] turns a [`QueuedEvent`](fw_core::QueuedEvent) into a
//! human-readable HTML message and hands it to a [`NotifyTransport`], retrying
//! transient failures with exponential backoff.
//!
//! ## Transports
//!
//! | Transport            | Use                                          |
//! |----------------------|----------------------------------------------|
//! | [`TelegramTransport`]| Telegram Bot API `sendMessage`               |
//! | [`LogTransport`]     | credentials missing: alerts are only logged  |

pub mod error;
pub mod format;
pub mod log_transport;
pub mod retry;
pub mod sink;
pub mod telegram;

use async_trait::async_trait;

pub use error::{DeliveryError, FailureClass, StatusClass, classify_status};
pub use log_transport::LogTransport;
pub use retry::RetryPolicy;
pub use sink::NotificationSink;
pub use telegram::TelegramTransport;

/// Outbound transport for formatted alert messages.
///
/// Implementations perform exactly one delivery attempt per call; retries are
/// owned by [`NotificationSink`].
#[async_trait]
pub trait NotifyTransport: Send + Sync {
    /// Short label for log lines (e.g. `"telegram"`).
    fn name(&self) -> &str;

    /// Deliver one message.
    async fn deliver(&self, text: &str) -> Result<(), DeliveryError>;
}
