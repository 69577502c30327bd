//! Ingest callback: inbound frame → liveness stamp → queued events.

use std::sync::Arc;

use fw_core::{QueuedEvent, short_address};
use tracing::{debug, info, warn};

use crate::FeedCallback;
use crate::hyperliquid::json_parser::{FeedMessage, parse_message};
use crate::queue::EventQueue;
use crate::state::ListenerState;

/// Longest payload excerpt written to the log for an unparseable frame.
const PAYLOAD_LOG_LIMIT: usize = 256;

/// Build the callback handed to every subscription.
pub fn ingest_callback(state: Arc<ListenerState>, queue: EventQueue) -> FeedCallback {
    Arc::new(move |text| {
        handle_message(&state, &queue, text);
    })
}

/// Process one frame and return how many events were queued.
///
/// The liveness clock is stamped before parsing, so snapshots, acks and even
/// garbage count as proof that the connection is alive.
pub fn handle_message(state: &ListenerState, queue: &EventQueue, text: &str) -> usize {
    state.touch();

    match parse_message(text) {
        Ok(FeedMessage::Fills { user, fills }) => {
            let n = fills.len();
            for fill in fills {
                info!(
                    "[ingest] trade for {} | {} {} | price {} | size {}",
                    short_address(&user),
                    fill.side(),
                    fill.coin(),
                    fill.price(),
                    fill.size()
                );
                queue.push(QueuedEvent::new(fill, user.clone()));
            }
            n
        }
        Ok(FeedMessage::Snapshot { user, fills }) => {
            debug!("[ingest] snapshot for {} ignored ({fills} fills)", short_address(&user));
            0
        }
        Ok(FeedMessage::Control) => 0,
        Ok(FeedMessage::Other { channel }) => {
            debug!("[ingest] ignoring channel {channel}");
            0
        }
        Err(e) => {
            warn!("[ingest] dropping frame: {e} | payload: {}", excerpt(text));
            0
        }
    }
}

fn excerpt(text: &str) -> &str {
    match text.char_indices().nth(PAYLOAD_LOG_LIMIT) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
