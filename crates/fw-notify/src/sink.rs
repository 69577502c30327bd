//! Notification sink: format, then deliver with bounded retries.

use std::sync::Arc;

use fw_core::QueuedEvent;
use tracing::{debug, warn};

use crate::format::format_fill_message;
use crate::{DeliveryError, NotifyTransport, RetryPolicy};

/// Formats queued fills and pushes them through a [`NotifyTransport`].
///
/// Transient failures are retried with exponential backoff up to
/// [`RetryPolicy::max_attempts`]; permanent failures return immediately.
pub struct NotificationSink {
    transport: Arc<dyn NotifyTransport>,
    retry: RetryPolicy,
}

impl NotificationSink {
    pub fn new(transport: Arc<dyn NotifyTransport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    /// Format `event` and deliver it.
    pub async fn send_trade_alert(&self, event: &QueuedEvent) -> Result<(), DeliveryError> {
        let text = format_fill_message(&event.fill, &event.user)?;
        self.deliver(&text).await
    }

    /// Deliver preformatted text, retrying transient failures.
    pub async fn deliver(&self, text: &str) -> Result<(), DeliveryError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.transport.deliver(text).await {
                Ok(()) => {
                    debug!("[notify] {} delivered on attempt {}", self.transport.name(), attempt);
                    return Ok(());
                }
                Err(e) if e.is_retryable() && self.retry.allows_retry(attempt) => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        "[notify] {} attempt {}/{} failed: {}, retrying in {:?}",
                        self.transport.name(),
                        attempt,
                        self.retry.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use fw_core::TradeFill;
    use serde_json::json;

    use super::*;

    /// Replays scripted outcomes and records every message it was given.
    #[derive(Default)]
    struct RecordingTransport {
        script: Mutex<VecDeque<Result<(), DeliveryError>>>,
        sent: Mutex<Vec<String>>,
    }

    impl RecordingTransport {
        fn scripted(outcomes: Vec<Result<(), DeliveryError>>) -> Arc<Self> {
            Arc::new(Self { script: Mutex::new(outcomes.into()), sent: Mutex::default() })
        }

        fn calls(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl NotifyTransport for RecordingTransport {
        fn name(&self) -> &str {
            "recording"
        }

        async fn deliver(&self, text: &str) -> Result<(), DeliveryError> {
            self.sent.lock().unwrap().push(text.to_string());
            self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }
    }

    fn unavailable() -> Result<(), DeliveryError> {
        Err(DeliveryError::Unavailable { status: 503, body: "busy".into() })
    }

    fn btc_event() -> QueuedEvent {
        QueuedEvent::new(
            TradeFill(json!({"coin": "BTC", "side": "B", "px": "50000", "sz": "0.1", "closedPnl": "0"})),
            "0x1234567890abcdef1234567890abcdef12345678",
        )
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_until_success() {
        let transport = RecordingTransport::scripted(vec![unavailable(), unavailable(), Ok(())]);
        let sink = NotificationSink::new(transport.clone(), RetryPolicy::default());

        sink.send_trade_alert(&btc_event()).await.unwrap();
        assert_eq!(transport.calls(), 3);
        let sent = transport.sent.lock().unwrap();
        assert!(sent[0].contains("BTC"));
        assert!(sent[0].contains("50000"));
        assert!(sent[0].contains("0x1234...5678"));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_stop_at_max_attempts() {
        let transport = RecordingTransport::scripted(vec![unavailable(), unavailable(), unavailable(), Ok(())]);
        let sink = NotificationSink::new(transport.clone(), RetryPolicy::default());

        let err = sink.deliver("hello").await.unwrap_err();
        assert!(matches!(err, DeliveryError::Unavailable { status: 503, .. }));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_is_not_retried() {
        let transport = RecordingTransport::scripted(vec![Err(DeliveryError::Rejected {
            status: 400,
            body: "chat not found".into(),
        })]);
        let sink = NotificationSink::new(transport.clone(), RetryPolicy::default());

        let err = sink.deliver("hello").await.unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn malformed_fill_never_reaches_transport() {
        let transport = RecordingTransport::scripted(vec![]);
        let sink = NotificationSink::new(transport.clone(), RetryPolicy::default());

        let event = QueuedEvent::new(TradeFill(json!("not an object")), "0xABC");
        let err = sink.send_trade_alert(&event).await.unwrap_err();
        assert!(matches!(err, DeliveryError::MalformedFill(_)));
        assert_eq!(transport.calls(), 0);
    }
}
