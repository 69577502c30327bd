//! In-memory feed and transport doubles for tests.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use async_trait::async_trait;
use fw_core::Topic;
use fw_notify::{DeliveryError, NotifyTransport};

use crate::{FeedCallback, FeedConnection, FeedSource, SubscriptionId};

/// Calls observed by a [`FakeFeed`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedCall {
    Open,
    Subscribe(String),
    Unsubscribe(String, SubscriptionId),
    Close,
}

#[derive(Default)]
struct Shared {
    calls: Mutex<Vec<FeedCall>>,
    routes: Mutex<Vec<(String, SubscriptionId, FeedCallback)>>,
    fail_subscribe: Mutex<Option<String>>,
    failing_opens: AtomicU32,
    opens: AtomicU32,
    next_id: AtomicU64,
    current_alive: Mutex<Option<Arc<AtomicBool>>>,
}

/// Scriptable [`FeedSource`].
#[derive(Clone, Default)]
pub struct FakeFeed {
    shared: Arc<Shared>,
}

impl FakeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subscribe for `user` fail.
    pub fn fail_subscribe_for(&self, user: &str) {
        *self.shared.fail_subscribe.lock().unwrap() = Some(user.to_ascii_lowercase());
    }

    pub fn clear_failures(&self) {
        *self.shared.fail_subscribe.lock().unwrap() = None;
        self.shared.failing_opens.store(0, Ordering::SeqCst);
    }

    /// Make the next `n` opens fail.
    pub fn fail_opens(&self, n: u32) {
        self.shared.failing_opens.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<FeedCall> {
        self.shared.calls.lock().unwrap().clone()
    }

    /// Successful opens so far.
    pub fn opens(&self) -> u32 {
        self.shared.opens.load(Ordering::SeqCst)
    }

    pub fn active_subscriptions(&self) -> usize {
        self.shared.routes.lock().unwrap().len()
    }

    /// Deliver `text` to the callback subscribed for `user`.
    pub fn inject(&self, user: &str, text: &str) {
        let key = user.to_ascii_lowercase();
        let cb = self
            .shared
            .routes
            .lock()
            .unwrap()
            .iter()
            .find(|(k, _, _)| *k == key)
            .map(|(_, _, cb)| Arc::clone(cb));
        if let Some(cb) = cb {
            cb(text);
        }
    }

    /// Simulate the server dropping the current connection.
    pub fn kill_connection(&self) {
        if let Some(alive) = self.shared.current_alive.lock().unwrap().as_ref() {
            alive.store(false, Ordering::SeqCst);
        }
    }

    fn record(&self, call: FeedCall) {
        self.shared.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl FeedSource for FakeFeed {
    fn name(&self) -> &str {
        "fake"
    }

    async fn open(&self) -> Result<Box<dyn FeedConnection>> {
        let failing = self.shared.failing_opens.load(Ordering::SeqCst);
        if failing > 0 {
            self.shared.failing_opens.store(failing - 1, Ordering::SeqCst);
            bail!("fake open refused");
        }
        self.record(FeedCall::Open);
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        let alive = Arc::new(AtomicBool::new(true));
        *self.shared.current_alive.lock().unwrap() = Some(Arc::clone(&alive));
        Ok(Box::new(FakeConnection { feed: self.clone(), alive }))
    }
}

struct FakeConnection {
    feed: FakeFeed,
    alive: Arc<AtomicBool>,
}

#[async_trait]
impl FeedConnection for FakeConnection {
    async fn subscribe(&mut self, topic: &Topic, callback: FeedCallback) -> Result<SubscriptionId> {
        self.feed.record(FeedCall::Subscribe(topic.user().to_string()));
        if self.feed.shared.fail_subscribe.lock().unwrap().as_deref() == Some(topic.key().as_str()) {
            bail!("fake subscribe refused for {}", topic.user());
        }
        let id = SubscriptionId(self.feed.shared.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.feed.shared.routes.lock().unwrap().push((topic.key(), id, callback));
        Ok(id)
    }

    async fn unsubscribe(&mut self, topic: &Topic, id: SubscriptionId) -> Result<()> {
        self.feed.record(FeedCall::Unsubscribe(topic.user().to_string(), id));
        self.feed.shared.routes.lock().unwrap().retain(|(_, sid, _)| *sid != id);
        Ok(())
    }

    async fn close(&mut self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            self.feed.record(FeedCall::Close);
        }
        self.feed.shared.routes.lock().unwrap().clear();
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// [`NotifyTransport`] that remembers every message and always succeeds.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<String>>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotifyTransport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn deliver(&self, text: &str) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// A non-snapshot `userFills` frame with one fill.
pub fn fill_frame(user: &str, coin: &str, px: &str, sz: &str) -> String {
    serde_json::json!({
        "channel": "userFills",
        "data": {
            "user": user,
            "fills": [{ "coin": coin, "side": "B", "px": px, "sz": sz, "closedPnl": "0" }]
        }
    })
    .to_string()
}
