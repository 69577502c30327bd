//! Listener orchestrator.
//!
//! ```text
//! Created ─► Starting ─► Connected ⇄ Reconnecting ─► Stopped
//!                │                        │
//!                └──── initial connect ───┴─► Failed
//! ```
//!
//! [`Listener::run`] owns the supervisory loop. The heartbeat monitor runs as
//! a separate task and the delivery worker on a blocking thread; all three
//! observe the same running flag in [`ListenerState`].

use std::sync::Arc;
use std::time::Duration;

use fw_core::Topic;
use fw_core::config::ListenerConfig;
use fw_notify::NotificationSink;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::FeedSource;
use crate::delivery::{DeliveryConfig, DeliveryStats, spawn_delivery_worker};
use crate::heartbeat::run_heartbeat;
use crate::ingest::ingest_callback;
use crate::queue::EventQueue;
use crate::reconnect::ReconnectController;
use crate::state::{ListenerExit, ListenerPhase, ListenerState};
use crate::subscription::SubscriptionManager;

/// Extra time granted to background tasks on top of their own poll periods
/// before shutdown stops waiting for them.
const SHUTDOWN_SLACK: Duration = Duration::from_secs(2);

/// Timing and bounds for one listener.
#[derive(Debug, Clone, Copy)]
pub struct ListenerSettings {
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub reconnect_initial_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub queue_poll_timeout: Duration,
    pub supervisor_poll: Duration,
    pub shutdown_drain: Duration,
}

impl ListenerSettings {
    pub fn from_config(cfg: &ListenerConfig) -> Self {
        Self {
            heartbeat_interval: cfg.heartbeat_interval(),
            heartbeat_timeout: cfg.heartbeat_timeout(),
            reconnect_initial_delay: cfg.reconnect_initial_delay(),
            reconnect_max_delay: cfg.reconnect_max_delay(),
            max_reconnect_attempts: cfg.max_reconnect_attempts,
            queue_poll_timeout: cfg.queue_poll_timeout(),
            supervisor_poll: cfg.supervisor_poll(),
            shutdown_drain: cfg.shutdown_drain(),
        }
    }
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self::from_config(&ListenerConfig::default())
    }
}

/// Wires the feed, queue, monitors and delivery worker together.
pub struct Listener {
    settings: ListenerSettings,
    state: Arc<ListenerState>,
    queue: EventQueue,
    sink: Arc<NotificationSink>,
    subs: Arc<SubscriptionManager>,
    reconnect: Arc<ReconnectController>,
}

impl Listener {
    pub fn new(
        source: Arc<dyn FeedSource>,
        topics: Vec<Topic>,
        sink: Arc<NotificationSink>,
        settings: ListenerSettings,
    ) -> Self {
        let state = Arc::new(ListenerState::new());
        let queue = EventQueue::new();
        let callback = ingest_callback(Arc::clone(&state), queue.clone());
        let subs = Arc::new(SubscriptionManager::new(source, topics, callback, Arc::clone(&state)));
        let reconnect = Arc::new(ReconnectController::new(
            Arc::clone(&state),
            Arc::clone(&subs),
            settings.reconnect_initial_delay,
            settings.reconnect_max_delay,
            settings.max_reconnect_attempts,
        ));
        Self { settings, state, queue, sink, subs, reconnect }
    }

    /// Shared state, for observers and signal handlers.
    pub fn state(&self) -> Arc<ListenerState> {
        Arc::clone(&self.state)
    }

    /// Request a graceful stop. `run()` returns shortly after.
    pub fn stop(&self) {
        info!("[listener] stop requested");
        self.state.shutdown(ListenerExit::Stopped);
    }

    /// Start everything and block until the listener stops or fails.
    pub async fn run(&self) -> ListenerExit {
        let topics = self.subs.topics();
        if topics.is_empty() {
            error!("[listener] no users configured, nothing to listen to");
            self.state.shutdown(ListenerExit::ConfigError);
            self.state.finish(ListenerExit::ConfigError);
            return ListenerExit::ConfigError;
        }

        self.state.set_phase(ListenerPhase::Starting);
        info!("[listener] starting for {} user(s): {}", topics.len(), join_short(topics));

        let heartbeat = tokio::spawn(run_heartbeat(
            Arc::clone(&self.state),
            Arc::clone(&self.reconnect),
            self.settings.heartbeat_interval,
            self.settings.heartbeat_timeout,
        ));
        let worker = spawn_delivery_worker(
            self.queue.clone(),
            Arc::clone(&self.sink),
            Arc::clone(&self.state),
            DeliveryConfig { poll_timeout: self.settings.queue_poll_timeout, drain: self.settings.shutdown_drain },
        );

        if self.subs.connect().await {
            self.state.set_phase(ListenerPhase::Connected);
            info!("[listener] listening");
        } else {
            error!("[listener] CRITICAL: initial connection failed, stopping");
            self.state.shutdown(ListenerExit::Failed);
        }

        self.supervise().await;
        self.shutdown(heartbeat, worker).await
    }

    /// Poll connection health until the listener stops.
    async fn supervise(&self) {
        while self.state.sleep_while_running(self.settings.supervisor_poll).await {
            if !self.state.is_connected() {
                if self.state.reconnect_attempts() == 0 {
                    self.reconnect.reconnect().await;
                }
            } else if !self.subs.connection_alive().await {
                warn!("[listener] connection dropped, reconnecting");
                self.state.set_connected(false);
                self.reconnect.reconnect().await;
            }
        }
    }

    async fn shutdown(&self, heartbeat: JoinHandle<()>, worker: JoinHandle<DeliveryStats>) -> ListenerExit {
        let exit = self.state.exit();
        info!("[listener] shutting down ({exit:?})");

        // The heartbeat may be mid-reconnect; let it finish before tearing
        // down so no fresh connection outlives the disconnect below.
        if tokio::time::timeout(SHUTDOWN_SLACK, heartbeat).await.is_err() {
            warn!("[listener] heartbeat monitor did not stop in time");
        }
        self.subs.disconnect().await;

        let worker_budget = self.settings.queue_poll_timeout + self.settings.shutdown_drain + SHUTDOWN_SLACK;
        match tokio::time::timeout(worker_budget, worker).await {
            Ok(Ok(stats)) => info!("[listener] delivery worker finished: {stats:?}"),
            Ok(Err(e)) => error!("[listener] delivery worker panicked: {e}"),
            Err(_) => warn!("[listener] delivery worker still busy, abandoning it"),
        }

        self.state.finish(exit);
        if exit == ListenerExit::Failed {
            error!("[listener] CRITICAL: listener failed");
        } else {
            info!("[listener] stopped");
        }
        exit
    }
}

fn join_short(topics: &[Topic]) -> String {
    topics.iter().map(Topic::short).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use fw_notify::RetryPolicy;

    use super::*;
    use crate::testing::{FakeFeed, RecordingTransport, fill_frame};

    fn fast_settings() -> ListenerSettings {
        ListenerSettings {
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(90),
            reconnect_initial_delay: Duration::from_millis(5),
            reconnect_max_delay: Duration::from_millis(20),
            max_reconnect_attempts: 3,
            queue_poll_timeout: Duration::from_millis(10),
            supervisor_poll: Duration::from_millis(10),
            shutdown_drain: Duration::ZERO,
        }
    }

    fn listener(feed: &FakeFeed, users: &[&str], transport: &Arc<RecordingTransport>) -> Arc<Listener> {
        let sink = Arc::new(NotificationSink::new(transport.clone(), RetryPolicy::default()));
        let topics = users.iter().map(Topic::new).collect();
        Arc::new(Listener::new(Arc::new(feed.clone()), topics, sink, fast_settings()))
    }

    fn spawn_run(l: &Arc<Listener>) -> JoinHandle<ListenerExit> {
        let l = Arc::clone(l);
        tokio::spawn(async move { l.run().await })
    }

    async fn wait_for(mut cond: impl FnMut() -> bool) {
        for _ in 0..500 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met in time");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn fill_reaches_the_transport() {
        let feed = FakeFeed::new();
        let transport = Arc::new(RecordingTransport::default());
        let l = listener(&feed, &["0xABC"], &transport);
        let run = spawn_run(&l);

        wait_for(|| l.state().is_connected()).await;
        assert_eq!(l.state().phase(), ListenerPhase::Connected);

        feed.inject("0xABC", &fill_frame("0xABC", "BTC", "50000", "0.1"));
        wait_for(|| transport.sent().len() == 1).await;

        let msg = &transport.sent()[0];
        assert!(msg.contains("BTC"));
        assert!(msg.contains("50000"));
        assert!(msg.contains("0.1"));
        assert!(msg.contains("<code>0xABC</code>"));

        l.stop();
        assert_eq!(run.await.unwrap(), ListenerExit::Stopped);
        assert_eq!(l.state().phase(), ListenerPhase::Stopped);
        assert_eq!(feed.active_subscriptions(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn snapshot_produces_no_notification() {
        let feed = FakeFeed::new();
        let transport = Arc::new(RecordingTransport::default());
        let l = listener(&feed, &["0xABC"], &transport);
        let run = spawn_run(&l);
        wait_for(|| l.state().is_connected()).await;

        let snapshot = r#"{"channel":"userFills","data":{"isSnapshot":true,"user":"0xABC","fills":[{"coin":"ETH"}]}}"#;
        feed.inject("0xABC", snapshot);
        feed.inject("0xABC", &fill_frame("0xABC", "SOL", "150", "2"));
        wait_for(|| !transport.sent().is_empty()).await;

        l.stop();
        run.await.unwrap();
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("SOL"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropped_connection_is_rebuilt() {
        let feed = FakeFeed::new();
        let transport = Arc::new(RecordingTransport::default());
        let l = listener(&feed, &["0xA", "0xB"], &transport);
        let run = spawn_run(&l);
        wait_for(|| l.state().is_connected()).await;

        feed.kill_connection();
        wait_for(|| feed.opens() == 2 && l.state().is_connected()).await;
        assert_eq!(l.state().reconnect_attempts(), 0);
        assert_eq!(feed.active_subscriptions(), 2);

        l.stop();
        assert_eq!(run.await.unwrap(), ListenerExit::Stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn exhausted_reconnects_fail_the_listener() {
        let feed = FakeFeed::new();
        let transport = Arc::new(RecordingTransport::default());
        let l = listener(&feed, &["0xA"], &transport);
        let run = spawn_run(&l);
        wait_for(|| l.state().is_connected()).await;

        feed.fail_opens(u32::MAX);
        feed.kill_connection();

        assert_eq!(run.await.unwrap(), ListenerExit::Failed);
        assert_eq!(l.state().phase(), ListenerPhase::Failed);
        assert_eq!(l.state().reconnect_attempts(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn initial_connect_failure_stops_without_retry() {
        let feed = FakeFeed::new();
        feed.fail_opens(1);
        let transport = Arc::new(RecordingTransport::default());
        let l = listener(&feed, &["0xA"], &transport);

        assert_eq!(l.run().await, ListenerExit::Failed);
        assert_eq!(feed.opens(), 0);
    }

    #[tokio::test]
    async fn no_topics_is_a_config_error() {
        let feed = FakeFeed::new();
        let transport = Arc::new(RecordingTransport::default());
        let l = listener(&feed, &[], &transport);

        assert_eq!(l.run().await, ListenerExit::ConfigError);
        assert!(feed.calls().is_empty());
        assert_eq!(l.state().phase(), ListenerPhase::Failed);
    }
}
