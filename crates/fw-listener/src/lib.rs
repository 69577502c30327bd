//! # fw-listener
//!
//! Resilient streaming listener for trade fills.
//!
//! ## Architecture
//!
//! ```text
//! FeedConnection ──► ingest callback ──► EventQueue ──► delivery worker ──► NotificationSink
//!        ▲                 │ stamps last-message time
//!        │                 ▼
//! SubscriptionManager ◄── ReconnectController ◄── heartbeat monitor / supervisory loop
//! ```
//!
//! The feed itself sits behind [`FeedSource`] / [`FeedConnection`] so the
//! orchestration can run against the Hyperliquid adapter in production and
//! against an in-memory fake in tests.
//!
//! ## Modules
//!
//! - [`hyperliquid`] — WebSocket feed adapter and message parser
//! - [`queue`] — unbounded FIFO between ingestion and delivery
//! - [`state`] — shared listener state (flags, counters, liveness clock)
//! - [`subscription`] — all-or-nothing subscribe / best-effort teardown
//! - [`heartbeat`] — staleness detection
//! - [`reconnect`] — exponential-backoff reconnection
//! - [`ingest`] — per-message callback feeding the queue
//! - [`delivery`] — blocking delivery worker
//! - [`listener`] — orchestrator and lifecycle

pub mod delivery;
pub mod heartbeat;
pub mod hyperliquid;
pub mod ingest;
pub mod listener;
pub mod queue;
pub mod reconnect;
pub mod state;
pub mod subscription;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use fw_core::Topic;

pub use listener::{Listener, ListenerSettings};
pub use state::{ListenerExit, ListenerPhase, ListenerState};

/// Callback invoked with the raw text of every inbound feed message routed to
/// a subscription. Runs on the connection's reader task and must not block.
pub type FeedCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Handle returned by [`FeedConnection::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Factory for streaming connections.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Human-readable feed name.
    fn name(&self) -> &str;
    /// Open a fresh connection with no subscriptions.
    async fn open(&self) -> Result<Box<dyn FeedConnection>>;
}

/// One open streaming connection.
#[async_trait]
pub trait FeedConnection: Send + Sync {
    /// Subscribe to fills for `topic`. Messages are delivered to `callback`.
    async fn subscribe(&mut self, topic: &Topic, callback: FeedCallback) -> Result<SubscriptionId>;
    /// Drop a subscription previously returned by [`subscribe`](Self::subscribe).
    async fn unsubscribe(&mut self, topic: &Topic, id: SubscriptionId) -> Result<()>;
    /// Close the connection. Must tolerate an already-closed connection.
    async fn close(&mut self);
    /// Whether the underlying transport is still running.
    fn is_alive(&self) -> bool;
}
