//! Single-session WebSocket connection with ping keep-alive.
//!
//! A `WsConnection` owns one tokio task that:
//! 1. Reads frames and forwards text payloads to a callback.
//! 2. Writes outbound messages queued through [`WsConnection::send`].
//! 3. Sends periodic ping messages (feed-specific format).
//!
//! The session does **not** reconnect on its own. When the stream ends the
//! task exits and [`WsConnection::is_alive`] turns false; rebuilding the
//! connection and its subscriptions is the caller's job.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::FwError;

/// Callback invoked for each received text message.
///
/// Parameters: `(connection_id, message_text)`
pub type OnMessageCallback = Arc<dyn Fn(usize, &str) + Send + Sync>;

/// Ping payload format.
#[derive(Debug, Clone)]
pub enum PingPayload {
    /// Send a JSON object as text (e.g. `{"method":"ping"}`).
    Json(serde_json::Value),
    /// Use the standard WebSocket ping frame.
    WebSocketPing,
}

/// Configuration for a single WebSocket connection.
#[derive(Debug, Clone)]
pub struct WsConnConfig {
    /// Full WebSocket URL (e.g. `wss://api.hyperliquid.xyz/ws`).
    pub url: String,
    /// Extra HTTP headers for the handshake.
    pub extra_headers: HashMap<String, String>,
    /// Interval between ping messages.
    pub ping_interval: Option<Duration>,
    /// Ping message format.
    pub ping_payload: Option<PingPayload>,
    /// Upper bound on the TCP + TLS + upgrade handshake.
    pub connect_timeout: Duration,
    /// Connection identifier, used as a log prefix.
    pub id: usize,
}

/// Outbound queue depth. Subscriptions are the only regular traffic.
const OUTBOUND_CAPACITY: usize = 64;

/// Upper bound on the close handshake during shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// A live WebSocket session managed by a background tokio task.
pub struct WsConnection {
    /// Connection configuration.
    pub config: WsConnConfig,
    outbound_tx: Option<mpsc::Sender<String>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    alive: Arc<AtomicBool>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl WsConnection {
    /// Perform the handshake and start the session task.
    ///
    /// Text frames are forwarded to `on_text` from the session task, so the
    /// callback must not block.
    pub async fn connect(config: WsConnConfig, on_text: OnMessageCallback) -> Result<Self> {
        let conn_id = config.id;
        info!("[ws-{conn_id}] connecting to {}", config.url);

        let ws_stream = match tokio::time::timeout(config.connect_timeout, connect_ws(&config)).await {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => return Err(FwError::WebSocket(format!("connect to {} failed: {e}", config.url)).into()),
            Err(_) => {
                return Err(FwError::WebSocket(format!(
                    "connect to {} timed out after {:?}",
                    config.url, config.connect_timeout
                ))
                .into());
            }
        };
        info!("[ws-{conn_id}] connected");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
        let alive = Arc::new(AtomicBool::new(true));

        let session_cfg = config.clone();
        let session_alive = Arc::clone(&alive);
        let task = tokio::spawn(async move {
            session_loop(session_cfg, ws_stream, on_text, outbound_rx, shutdown_rx).await;
            session_alive.store(false, Ordering::SeqCst);
        });

        Ok(Self {
            config,
            outbound_tx: Some(outbound_tx),
            shutdown_tx: Some(shutdown_tx),
            alive,
            task: Some(task),
        })
    }

    /// Queue a text message for sending.
    ///
    /// Fails if the session has ended or [`close`](Self::close) was called.
    pub async fn send(&self, msg: String) -> Result<()> {
        if !self.is_alive() {
            return Err(anyhow!(FwError::WebSocket(format!("[ws-{}] session is closed", self.config.id))));
        }
        let tx = self
            .outbound_tx
            .as_ref()
            .ok_or_else(|| FwError::WebSocket(format!("[ws-{}] session is closed", self.config.id)))?;
        tx.send(msg)
            .await
            .map_err(|_| FwError::WebSocket(format!("[ws-{}] session task has exited", self.config.id)))?;
        Ok(())
    }

    /// Whether the session task is still reading from the socket.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Stop the session and wait for the task to finish.
    ///
    /// Safe to call more than once and on a session that already died.
    pub async fn close(&mut self) {
        self.outbound_tx = None;
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.alive.store(false, Ordering::SeqCst);
    }
}

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Session loop — reads, writes, pings until the stream ends or shutdown.
async fn session_loop(
    config: WsConnConfig,
    ws_stream: WsStream,
    on_text: OnMessageCallback,
    mut outbound_rx: mpsc::Receiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let conn_id = config.id;
    let (mut ws_write, mut ws_read) = ws_stream.split();

    let mut ping_interval = config.ping_interval.map(|d| {
        let mut iv = tokio::time::interval_at(tokio::time::Instant::now() + d, d);
        iv.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        iv
    });

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                info!("[ws-{conn_id}] shutdown signal received");
                let _ = tokio::time::timeout(CLOSE_TIMEOUT, ws_write.close()).await;
                break;
            }

            msg = ws_read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        on_text(conn_id, &text);
                    }
                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => on_text(conn_id, text),
                        Err(_) => debug!("[ws-{conn_id}] ignoring non-utf8 binary frame ({} bytes)", data.len()),
                    },
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        warn!("[ws-{conn_id}] received close frame: {frame:?}");
                        break;
                    }
                    Some(Err(e)) => {
                        error!("[ws-{conn_id}] read error: {e}");
                        break;
                    }
                    None => {
                        warn!("[ws-{conn_id}] stream ended");
                        break;
                    }
                    _ => {} // Pong, Frame — ignore
                }
            }

            Some(msg) = outbound_rx.recv() => {
                debug!("[ws-{conn_id}] send: {msg}");
                if let Err(e) = ws_write.send(Message::Text(msg.into())).await {
                    error!("[ws-{conn_id}] send error: {e}");
                    break;
                }
            }

            _ = next_ping(&mut ping_interval) => {
                let ping_msg = match &config.ping_payload {
                    Some(PingPayload::Json(j)) => Message::Text(j.to_string().into()),
                    Some(PingPayload::WebSocketPing) | None => Message::Ping(vec![].into()),
                };
                if let Err(e) = ws_write.send(ping_msg).await {
                    error!("[ws-{conn_id}] ping send error: {e}");
                    break;
                }
            }
        }
    }

    info!("[ws-{conn_id}] session ended");
}

/// Resolve on the next ping tick, or never when pinging is disabled.
async fn next_ping(interval: &mut Option<tokio::time::Interval>) {
    match interval {
        Some(iv) => {
            iv.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Establish a (TLS) WebSocket connection.
async fn connect_ws(config: &WsConnConfig) -> Result<WsStream> {
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;

    let url = url::Url::parse(&config.url).map_err(|e| FwError::Config(format!("invalid ws url {}: {e}", config.url)))?;
    let mut request = url.as_str().into_client_request()?;
    for (key, value) in &config.extra_headers {
        request.headers_mut().insert(
            tokio_tungstenite::tungstenite::http::HeaderName::from_bytes(key.as_bytes())?,
            tokio_tungstenite::tungstenite::http::HeaderValue::from_str(value)?,
        );
    }

    let (stream, _response) = tokio_tungstenite::connect_async(request).await?;
    Ok(stream)
}
