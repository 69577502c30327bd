//! Hyperliquid `userFills` feed over WebSocket.
//!
//! One [`HyperliquidFeed::open`] call creates one [`WsConnection`]. Each
//! subscription registers a callback keyed by the lowercased user address;
//! inbound frames are routed by `data.user`. Frames that match no
//! subscription (acks, pongs, unknown users) go to the earliest registered
//! callback, so liveness is stamped exactly once per frame.

pub mod json_parser;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use ahash::AHashMap;
use anyhow::Result;
use async_trait::async_trait;
use fw_core::Topic;
use fw_core::config::FeedConfig;
use fw_core::error::FwError;
use fw_core::ws::{OnMessageCallback, PingPayload, WsConnConfig, WsConnection};
use tracing::{debug, info};

use crate::{FeedCallback, FeedConnection, FeedSource, SubscriptionId};

/// Connection factory for the Hyperliquid WebSocket API.
pub struct HyperliquidFeed {
    url: String,
    ping_interval: Duration,
    connect_timeout: Duration,
    next_conn_id: AtomicUsize,
}

impl HyperliquidFeed {
    pub fn new(cfg: &FeedConfig) -> Self {
        Self {
            url: cfg.ws_url.clone(),
            ping_interval: cfg.ping_interval(),
            connect_timeout: cfg.connect_timeout(),
            next_conn_id: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl FeedSource for HyperliquidFeed {
    fn name(&self) -> &str {
        "hyperliquid"
    }

    async fn open(&self) -> Result<Box<dyn FeedConnection>> {
        let routes = Arc::new(RwLock::new(Routes::default()));

        let dispatch_routes = Arc::clone(&routes);
        let on_text: OnMessageCallback = Arc::new(move |_conn_id, text| {
            let key = json_parser::route_key(text);
            let target = dispatch_routes.read().unwrap_or_else(PoisonError::into_inner).pick(key.as_deref());
            match target {
                Some(cb) => cb(text),
                None => debug!("[hyperliquid] no subscription for frame, dropped"),
            }
        });

        let config = WsConnConfig {
            url: self.url.clone(),
            extra_headers: Default::default(),
            ping_interval: Some(self.ping_interval),
            ping_payload: Some(PingPayload::Json(json_parser::ping_payload())),
            connect_timeout: self.connect_timeout,
            id: self.next_conn_id.fetch_add(1, Ordering::Relaxed),
        };
        let ws = WsConnection::connect(config, on_text).await?;
        Ok(Box::new(HyperliquidConnection { ws, routes, next_sub_id: 0 }))
    }
}

/// Subscription callbacks keyed by lowercased user address.
#[derive(Default)]
struct Routes {
    by_user: AHashMap<String, (SubscriptionId, FeedCallback)>,
}

impl Routes {
    /// Callback for a routing key, falling back to the earliest subscription.
    fn pick(&self, key: Option<&str>) -> Option<FeedCallback> {
        if let Some((_, cb)) = key.and_then(|k| self.by_user.get(k)) {
            return Some(Arc::clone(cb));
        }
        self.by_user.values().min_by_key(|(id, _)| id.0).map(|(_, cb)| Arc::clone(cb))
    }
}

/// An open Hyperliquid session.
pub struct HyperliquidConnection {
    ws: WsConnection,
    routes: Arc<RwLock<Routes>>,
    next_sub_id: u64,
}

impl HyperliquidConnection {
    fn conn_id(&self) -> usize {
        self.ws.config.id
    }
}

#[async_trait]
impl FeedConnection for HyperliquidConnection {
    async fn subscribe(&mut self, topic: &Topic, callback: FeedCallback) -> Result<SubscriptionId> {
        let key = topic.key();
        let exists = self.routes.read().unwrap_or_else(PoisonError::into_inner).by_user.contains_key(&key);
        if exists {
            return Err(FwError::Feed(format!("already subscribed to {topic}")).into());
        }

        self.ws.send(json_parser::build_subscribe(topic)).await?;

        self.next_sub_id += 1;
        let id = SubscriptionId(self.next_sub_id);
        self.routes.write().unwrap_or_else(PoisonError::into_inner).by_user.insert(key, (id, callback));
        debug!("[ws-{}] subscribe sent for {topic} (id {id})", self.conn_id());
        Ok(id)
    }

    async fn unsubscribe(&mut self, topic: &Topic, id: SubscriptionId) -> Result<()> {
        let key = topic.key();
        {
            let mut routes = self.routes.write().unwrap_or_else(PoisonError::into_inner);
            match routes.by_user.get(&key) {
                Some((current, _)) if *current == id => {
                    routes.by_user.remove(&key);
                }
                _ => return Err(FwError::Feed(format!("no subscription {id} for {topic}")).into()),
            }
        }
        self.ws.send(json_parser::build_unsubscribe(topic)).await
    }

    async fn close(&mut self) {
        self.ws.close().await;
        self.routes.write().unwrap_or_else(PoisonError::into_inner).by_user.clear();
        info!("[ws-{}] connection closed", self.conn_id());
    }

    fn is_alive(&self) -> bool {
        self.ws.is_alive()
    }
}
