//! # fw-core
//!
//! Core crate for the fillwatch system, providing:
//!
//! - **Types** (`types`) — user addresses, fill side, trade fills, queued events
//! - **Configuration** (`config`) — JSON config deserialization + env overrides
//! - **Error types** (`error`) — domain-specific `FwError` via thiserror
//! - **WebSocket** (`ws`) — single-session WS connection with ping keep-alive
//! - **Time utilities** (`time_util`) — monotonic clock and backoff
//! - **Logging** (`logging`) — tracing-based structured logging

pub mod config;
pub mod error;
pub mod logging;
pub mod time_util;
pub mod types;
pub mod ws;

// Re-export types at crate root for convenience.
pub use types::*;
