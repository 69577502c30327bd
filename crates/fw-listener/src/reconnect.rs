//! Exponential-backoff reconnection.
//!
//! A cycle keeps trying until one connect succeeds, the listener stops, or
//! the attempt budget runs out. Running out is terminal: the listener is shut
//! down with [`ListenerExit::Failed`].

use std::sync::Arc;
use std::time::Duration;

use fw_core::time_util::exponential_backoff;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::state::{ListenerExit, ListenerPhase, ListenerState};
use crate::subscription::SubscriptionManager;

/// Result of one [`ReconnectController::reconnect`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectOutcome {
    Reconnected,
    /// Another cycle was already running; this call did nothing.
    AlreadyRunning,
    /// Listener stopped mid-cycle.
    Cancelled,
    /// Attempt budget exhausted; listener shut down as failed.
    Exhausted,
}

pub struct ReconnectController {
    state: Arc<ListenerState>,
    subs: Arc<SubscriptionManager>,
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
    in_progress: Mutex<()>,
}

impl ReconnectController {
    pub fn new(
        state: Arc<ListenerState>,
        subs: Arc<SubscriptionManager>,
        initial_delay: Duration,
        max_delay: Duration,
        max_attempts: u32,
    ) -> Self {
        Self { state, subs, initial_delay, max_delay, max_attempts, in_progress: Mutex::new(()) }
    }

    /// Delay before attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        exponential_backoff(self.initial_delay, self.max_delay, attempt)
    }

    /// Run one reconnection cycle. Concurrent calls return
    /// [`ReconnectOutcome::AlreadyRunning`] immediately.
    pub async fn reconnect(&self) -> ReconnectOutcome {
        let Ok(_guard) = self.in_progress.try_lock() else {
            debug!("[reconnect] cycle already in progress");
            return ReconnectOutcome::AlreadyRunning;
        };
        self.state.set_phase(ListenerPhase::Reconnecting);

        while self.state.is_running() && self.state.reconnect_attempts() < self.max_attempts {
            let attempt = self.state.next_reconnect_attempt();
            let delay = self.delay_for(attempt);
            warn!("[reconnect] attempt {attempt}/{} in {delay:?}", self.max_attempts);

            if !self.state.sleep_while_running(delay).await {
                break;
            }

            self.subs.disconnect().await;
            if self.subs.connect().await {
                info!("[reconnect] reconnected after {attempt} attempt(s)");
                self.state.set_phase(ListenerPhase::Connected);
                return ReconnectOutcome::Reconnected;
            }
            warn!("[reconnect] attempt {attempt}/{} failed", self.max_attempts);
        }

        if !self.state.is_running() {
            debug!("[reconnect] listener stopping, cycle abandoned");
            return ReconnectOutcome::Cancelled;
        }

        error!("[reconnect] CRITICAL: giving up after {} attempts, stopping listener", self.max_attempts);
        self.state.shutdown(ListenerExit::Failed);
        ReconnectOutcome::Exhausted
    }
}

#[cfg(test)]
mod tests {
    use fw_core::Topic;

    use super::*;
    use crate::FeedCallback;
    use crate::testing::FakeFeed;

    fn controller(feed: &FakeFeed, max_attempts: u32) -> (Arc<ReconnectController>, Arc<SubscriptionManager>, Arc<ListenerState>) {
        let state = Arc::new(ListenerState::new());
        let callback: FeedCallback = Arc::new(|_| {});
        let subs = Arc::new(SubscriptionManager::new(
            Arc::new(feed.clone()),
            vec![Topic::new("0xA"), Topic::new("0xB"), Topic::new("0xC")],
            callback,
            Arc::clone(&state),
        ));
        let ctl = Arc::new(ReconnectController::new(
            Arc::clone(&state),
            Arc::clone(&subs),
            Duration::from_secs(1),
            Duration::from_secs(60),
            max_attempts,
        ));
        (ctl, subs, state)
    }

    #[test]
    fn delay_sequence() {
        let (ctl, _, _) = controller(&FakeFeed::new(), 10);
        let secs: Vec<u64> = (1..=9).map(|a| ctl.delay_for(a).as_secs()).collect();
        assert_eq!(secs, vec![1, 2, 4, 8, 16, 32, 60, 60, 60]);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_failed_attempts() {
        let feed = FakeFeed::new();
        let (ctl, subs, state) = controller(&feed, 10);
        assert!(subs.connect().await);

        feed.fail_opens(2);
        let started = tokio::time::Instant::now();
        assert_eq!(ctl.reconnect().await, ReconnectOutcome::Reconnected);

        // 1 s + 2 s + 4 s of backoff before the third attempt succeeds.
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(7) && waited < Duration::from_secs(8), "waited {waited:?}");
        assert!(state.is_connected());
        assert_eq!(state.reconnect_attempts(), 0);
        assert_eq!(state.phase(), ListenerPhase::Connected);
        assert_eq!(subs.subscription_count().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_failure_is_cleaned_before_next_attempt() {
        let feed = FakeFeed::new();
        let (ctl, subs, state) = controller(&feed, 3);
        assert!(subs.connect().await);

        feed.fail_subscribe_for("0xB");
        assert_eq!(ctl.reconnect().await, ReconnectOutcome::Exhausted);
        assert!(!state.is_connected());
        assert_eq!(feed.active_subscriptions(), 0);
        assert!(!subs.connection_alive().await);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_fails_the_listener() {
        let feed = FakeFeed::new();
        let (ctl, _subs, state) = controller(&feed, 4);
        feed.fail_opens(u32::MAX);

        assert_eq!(ctl.reconnect().await, ReconnectOutcome::Exhausted);
        assert_eq!(state.reconnect_attempts(), 4);
        assert!(!state.is_running());
        assert_eq!(state.exit(), ListenerExit::Failed);
        assert_eq!(feed.opens(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn only_one_cycle_at_a_time() {
        let feed = FakeFeed::new();
        let (ctl, _subs, _state) = controller(&feed, 10);

        let first = {
            let ctl = Arc::clone(&ctl);
            tokio::spawn(async move { ctl.reconnect().await })
        };
        tokio::task::yield_now().await;
        assert_eq!(ctl.reconnect().await, ReconnectOutcome::AlreadyRunning);
        assert_eq!(first.await.unwrap(), ReconnectOutcome::Reconnected);
        assert_eq!(feed.opens(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_backoff() {
        let feed = FakeFeed::new();
        let (ctl, _subs, state) = controller(&feed, 10);
        let cycle = {
            let ctl = Arc::clone(&ctl);
            tokio::spawn(async move { ctl.reconnect().await })
        };
        tokio::task::yield_now().await;
        state.shutdown(ListenerExit::Stopped);
        assert_eq!(cycle.await.unwrap(), ReconnectOutcome::Cancelled);
        assert_eq!(feed.opens(), 0);
    }
}
