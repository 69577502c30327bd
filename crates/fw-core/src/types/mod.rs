//! Core data types shared by the listener and the notifier.
//!
//! Fills are kept as opaque JSON values: the feed adds fields over time and
//! the notifier only ever reads a handful of them.

pub mod address;
pub mod enums;
pub mod fill;

pub use address::*;
pub use enums::*;
pub use fill::*;
