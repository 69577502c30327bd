//! Heartbeat monitor.
//!
//! Wakes every `interval`; when the listener is connected but nothing has
//! arrived for longer than `timeout`, marks it disconnected and runs a
//! reconnection cycle inline. No further checks happen until that cycle
//! resolves.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::reconnect::ReconnectController;
use crate::state::ListenerState;

/// Whether a connected listener has been silent for longer than `timeout`.
pub fn is_stale(state: &ListenerState, timeout: Duration) -> bool {
    state.is_connected() && state.since_last_message() > timeout
}

/// Run the monitor until the listener stops.
pub async fn run_heartbeat(
    state: Arc<ListenerState>,
    reconnect: Arc<ReconnectController>,
    interval: Duration,
    timeout: Duration,
) {
    info!("[heartbeat] monitor started (interval {interval:?}, timeout {timeout:?})");

    while state.sleep_while_running(interval).await {
        if !is_stale(&state, timeout) {
            continue;
        }
        warn!("[heartbeat] no message for {:?} (timeout {timeout:?}), reconnecting", state.since_last_message());
        state.set_connected(false);
        let outcome = reconnect.reconnect().await;
        debug!("[heartbeat] reconnect finished: {outcome:?}");
    }

    info!("[heartbeat] monitor stopped");
}
