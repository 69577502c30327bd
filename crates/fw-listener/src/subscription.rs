//! Subscription bookkeeping.
//!
//! [`SubscriptionManager::connect`] is all-or-nothing: either every topic is
//! subscribed on a fresh connection, or the partial session is torn down and
//! the listener stays disconnected. The handle map is always replaced
//! wholesale, never patched.

use std::sync::Arc;

use ahash::AHashMap;
use fw_core::Topic;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::state::ListenerState;
use crate::{FeedCallback, FeedConnection, FeedSource, SubscriptionId};

#[derive(Default)]
struct Session {
    conn: Option<Box<dyn FeedConnection>>,
    /// Topic key → (topic, handle).
    handles: AHashMap<String, (Topic, SubscriptionId)>,
}

/// Owns the feed connection and the active subscriptions.
pub struct SubscriptionManager {
    source: Arc<dyn FeedSource>,
    topics: Vec<Topic>,
    callback: FeedCallback,
    state: Arc<ListenerState>,
    session: Mutex<Session>,
}

impl SubscriptionManager {
    pub fn new(source: Arc<dyn FeedSource>, topics: Vec<Topic>, callback: FeedCallback, state: Arc<ListenerState>) -> Self {
        Self { source, topics, callback, state, session: Mutex::new(Session::default()) }
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Open a connection and subscribe every topic.
    ///
    /// On success the attempt counter is reset, the liveness clock stamped
    /// and the listener marked connected. Returns `false` if the connection
    /// could not be opened or any single subscribe failed.
    pub async fn connect(&self) -> bool {
        let mut session = self.session.lock().await;

        let mut conn = match self.source.open().await {
            Ok(c) => c,
            Err(e) => {
                error!("[subs] failed to open {} connection: {e:#}", self.source.name());
                self.state.set_connected(false);
                return false;
            }
        };

        let mut handles = AHashMap::with_capacity(self.topics.len());
        for topic in &self.topics {
            match conn.subscribe(topic, Arc::clone(&self.callback)).await {
                Ok(id) => {
                    info!("[subs] subscribed to {topic} (id {id})");
                    handles.insert(topic.key(), (topic.clone(), id));
                }
                Err(e) => {
                    error!("[subs] subscribe failed for {topic}: {e:#}");
                    teardown(&mut conn, &mut handles).await;
                    self.state.set_connected(false);
                    return false;
                }
            }
        }

        // Normally empty: reconnects disconnect first.
        if let Some(mut old) = session.conn.take() {
            teardown(&mut old, &mut session.handles).await;
        }
        session.conn = Some(conn);
        session.handles = handles;

        self.state.reset_reconnect_attempts();
        self.state.touch();
        self.state.set_connected(true);
        info!("[subs] {} subscription(s) active on {}", session.handles.len(), self.source.name());
        true
    }

    /// Unsubscribe everything and close the connection. Idempotent.
    pub async fn disconnect(&self) {
        let mut session = self.session.lock().await;
        self.state.set_connected(false);
        let Session { conn, handles } = &mut *session;
        match conn.take() {
            Some(mut c) => {
                teardown(&mut c, handles).await;
                info!("[subs] disconnected from {}", self.source.name());
            }
            None => handles.clear(),
        }
    }

    /// Whether the current connection's transport is still running.
    pub async fn connection_alive(&self) -> bool {
        self.session.lock().await.conn.as_ref().is_some_and(|c| c.is_alive())
    }

    pub async fn subscription_count(&self) -> usize {
        self.session.lock().await.handles.len()
    }
}

/// Best-effort unsubscribe of every handle, then close.
async fn teardown(conn: &mut Box<dyn FeedConnection>, handles: &mut AHashMap<String, (Topic, SubscriptionId)>) {
    for (_, (topic, id)) in handles.drain() {
        match conn.unsubscribe(&topic, id).await {
            Ok(()) => info!("[subs] unsubscribed from {topic}"),
            Err(e) => debug!("[subs] unsubscribe from {topic} failed: {e:#}"),
        }
    }
    conn.close().await;
}
