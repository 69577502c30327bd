//! WebSocket session client.

pub mod client;

pub use client::{OnMessageCallback, PingPayload, WsConnConfig, WsConnection};
