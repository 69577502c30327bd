//! Fallback transport used when no notification credentials are configured.

use async_trait::async_trait;
use tracing::info;

use crate::{DeliveryError, NotifyTransport};

/// Writes alerts to the log instead of sending them anywhere.
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl NotifyTransport for LogTransport {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, text: &str) -> Result<(), DeliveryError> {
        info!("[notify-log] {}", text.replace('\n', " | "));
        Ok(())
    }
}
