//! Delivery worker.
//!
//! Runs on a dedicated blocking thread so slow notification calls never hold
//! up the reader task. The loop polls the queue with a timeout, which bounds
//! how long it takes to notice shutdown. Async delivery is driven through the
//! runtime handle captured at spawn time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use fw_core::{QueuedEvent, short_address};
use fw_notify::NotificationSink;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::queue::EventQueue;
use crate::state::ListenerState;

/// Counters reported when the worker exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: u64,
    pub failed: u64,
    /// Events still queued when the worker exited.
    pub dropped: usize,
}

/// Worker parameters.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryConfig {
    /// How long one dequeue blocks before re-checking the running flag.
    pub poll_timeout: Duration,
    /// After shutdown, keep delivering queued events for at most this long.
    pub drain: Duration,
}

/// Spawn the worker on tokio's blocking pool.
///
/// Must be called from within a runtime.
pub fn spawn_delivery_worker(
    queue: EventQueue,
    sink: Arc<NotificationSink>,
    state: Arc<ListenerState>,
    config: DeliveryConfig,
) -> JoinHandle<DeliveryStats> {
    let handle = Handle::current();
    tokio::task::spawn_blocking(move || run_delivery_loop(&queue, &sink, &state, &handle, config))
}

/// Deliver queued events until the listener stops, then drain for at most
/// `config.drain`.
pub fn run_delivery_loop(
    queue: &EventQueue,
    sink: &NotificationSink,
    state: &ListenerState,
    handle: &Handle,
    config: DeliveryConfig,
) -> DeliveryStats {
    info!("[delivery] worker started ({})", sink.transport_name());
    let mut stats = DeliveryStats::default();

    while state.is_running() {
        if let Some(event) = queue.pop_timeout(config.poll_timeout) {
            deliver_one(sink, handle, &event, &mut stats);
        }
    }

    if !config.drain.is_zero() {
        let deadline = Instant::now() + config.drain;
        while Instant::now() < deadline {
            match queue.try_pop() {
                Some(event) => deliver_one(sink, handle, &event, &mut stats),
                None => break,
            }
        }
    }

    stats.dropped = queue.len();
    if stats.dropped > 0 {
        warn!("[delivery] {} queued event(s) dropped at shutdown", stats.dropped);
    }
    info!("[delivery] worker stopped: {} delivered, {} failed", stats.delivered, stats.failed);
    stats
}

fn deliver_one(sink: &NotificationSink, handle: &Handle, event: &QueuedEvent, stats: &mut DeliveryStats) {
    match handle.block_on(sink.send_trade_alert(event)) {
        Ok(()) => stats.delivered += 1,
        Err(e) => {
            stats.failed += 1;
            error!("[delivery] alert for {} failed: {e}", short_address(&event.user));
        }
    }
}
