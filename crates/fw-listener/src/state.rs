//! Shared listener state.
//!
//! Every field is either an atomic or a watch channel so the ingest callback
//! (reader task), the heartbeat monitor, the supervisory loop and the
//! delivery thread can all read it without locking.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use fw_core::time_util::MonotonicClock;
use tokio::sync::watch;

/// Lifecycle phase of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ListenerPhase {
    Created = 0,
    Starting = 1,
    Connected = 2,
    Reconnecting = 3,
    Stopped = 4,
    Failed = 5,
}

impl ListenerPhase {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Created,
            1 => Self::Starting,
            2 => Self::Connected,
            3 => Self::Reconnecting,
            4 => Self::Stopped,
            _ => Self::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

/// How [`Listener::run`](crate::Listener::run) ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerExit {
    /// Stopped on request (signal or `stop()`).
    Stopped,
    /// Gave up: initial connect failed or reconnect attempts exhausted.
    Failed,
    /// Refused to start because of invalid configuration.
    ConfigError,
}

impl ListenerExit {
    /// Process exit code for this outcome.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Stopped => 0,
            Self::Failed => 1,
            Self::ConfigError => 2,
        }
    }
}

const OUTCOME_NONE: u8 = 0;
const OUTCOME_STOPPED: u8 = 1;
const OUTCOME_FAILED: u8 = 2;

pub struct ListenerState {
    clock: MonotonicClock,
    connected: AtomicBool,
    reconnect_attempts: AtomicU32,
    /// Last message time in [`MonotonicClock`] milliseconds.
    last_message_ms: AtomicU64,
    running: watch::Sender<bool>,
    phase: AtomicU8,
    outcome: AtomicU8,
}

impl ListenerState {
    pub fn new() -> Self {
        let (running, _) = watch::channel(true);
        Self {
            clock: MonotonicClock::new(),
            connected: AtomicBool::new(false),
            reconnect_attempts: AtomicU32::new(0),
            last_message_ms: AtomicU64::new(0),
            running,
            phase: AtomicU8::new(ListenerPhase::Created as u8),
            outcome: AtomicU8::new(OUTCOME_NONE),
        }
    }

    // -- connection --------------------------------------------------------

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::SeqCst)
    }

    /// Count one more reconnect attempt and return the new total.
    pub fn next_reconnect_attempt(&self) -> u32 {
        self.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn reset_reconnect_attempts(&self) {
        self.reconnect_attempts.store(0, Ordering::SeqCst);
    }

    // -- liveness ----------------------------------------------------------

    /// Record that a message (or a fresh connection) was just seen.
    ///
    /// Uses `fetch_max` so concurrent stamps never move the value backwards.
    pub fn touch(&self) {
        self.last_message_ms.fetch_max(self.clock.now_ms(), Ordering::SeqCst);
    }

    pub fn last_message_ms(&self) -> u64 {
        self.last_message_ms.load(Ordering::SeqCst)
    }

    /// Time elapsed since the last [`touch`](Self::touch).
    pub fn since_last_message(&self) -> Duration {
        self.clock.since(self.last_message_ms())
    }

    // -- lifecycle ---------------------------------------------------------

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Clear the running flag. The first outcome recorded wins, so a later
    /// `stop()` cannot turn a failure into a clean stop.
    pub fn shutdown(&self, exit: ListenerExit) {
        let code = match exit {
            ListenerExit::Stopped => OUTCOME_STOPPED,
            ListenerExit::Failed | ListenerExit::ConfigError => OUTCOME_FAILED,
        };
        let _ = self.outcome.compare_exchange(OUTCOME_NONE, code, Ordering::SeqCst, Ordering::SeqCst);
        self.running.send_replace(false);
    }

    /// Outcome recorded by [`shutdown`](Self::shutdown); `Stopped` if none.
    pub fn exit(&self) -> ListenerExit {
        match self.outcome.load(Ordering::SeqCst) {
            OUTCOME_FAILED => ListenerExit::Failed,
            _ => ListenerExit::Stopped,
        }
    }

    /// Sleep for `duration`, waking early on shutdown.
    ///
    /// Returns whether the listener is still running afterwards.
    pub async fn sleep_while_running(&self, duration: Duration) -> bool {
        let mut rx = self.running.subscribe();
        if !*rx.borrow_and_update() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = rx.wait_for(|running| !*running) => {}
        }
        self.is_running()
    }

    /// Resolve once the listener stops.
    pub async fn stopped(&self) {
        let mut rx = self.running.subscribe();
        let _ = rx.wait_for(|running| !*running).await;
    }

    pub fn phase(&self) -> ListenerPhase {
        ListenerPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// Move to a non-terminal phase. Ignored once the listener has stopped.
    pub fn set_phase(&self, phase: ListenerPhase) {
        let _ = self.phase.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| {
            (!ListenerPhase::from_u8(cur).is_terminal()).then_some(phase as u8)
        });
    }

    /// Enter the terminal phase matching `exit`.
    pub fn finish(&self, exit: ListenerExit) {
        let phase = match exit {
            ListenerExit::Stopped => ListenerPhase::Stopped,
            ListenerExit::Failed | ListenerExit::ConfigError => ListenerPhase::Failed,
        };
        self.phase.store(phase as u8, Ordering::SeqCst);
    }
}

impl Default for ListenerState {
    fn default() -> Self {
        Self::new()
    }
}
