//! Delivery errors and the HTTP status mapping table.
//!
//! Every failure is either **permanent** (retrying cannot help: bad request,
//! revoked token, unformattable fill) or **transient** (server error, rate
//! limit, network). Only transient failures are retried.

use std::ops::RangeInclusive;

use thiserror::Error;

/// Errors produced while formatting or delivering a notification.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The transport rejected the request (4xx-equivalent).
    #[error("rejected by transport (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// The transport is temporarily unable to accept the request
    /// (5xx, 408, 429).
    #[error("transport unavailable (HTTP {status}): {body}")]
    Unavailable { status: u16, body: String },

    /// Connection, TLS, or timeout failure before a response was received.
    #[error("network error: {0}")]
    Network(String),

    /// The formatted message exceeds the transport's size limit.
    #[error("message too long: {len} > {max} characters")]
    MessageTooLong { len: usize, max: usize },

    /// The fill record could not be turned into a message.
    #[error("malformed fill: {0}")]
    MalformedFill(String),
}

/// Retry classification of a [`DeliveryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Permanent,
    Transient,
}

impl DeliveryError {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Rejected { .. } | Self::MessageTooLong { .. } | Self::MalformedFill(_) => FailureClass::Permanent,
            Self::Unavailable { .. } | Self::Network(_) => FailureClass::Transient,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == FailureClass::Transient
    }

    /// Build the error matching an HTTP response status, or `None` on success.
    pub fn from_status(status: u16, body: impl Into<String>) -> Option<Self> {
        match classify_status(status) {
            StatusClass::Success => None,
            StatusClass::Transient => Some(Self::Unavailable { status, body: body.into() }),
            StatusClass::Permanent => Some(Self::Rejected { status, body: body.into() }),
        }
    }
}

/// Outcome category of an HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Permanent,
    Transient,
}

/// Status ranges in match order. The first matching row wins.
const STATUS_TABLE: &[(RangeInclusive<u16>, StatusClass)] = &[
    (200..=299, StatusClass::Success),
    (408..=408, StatusClass::Transient), // request timeout
    (429..=429, StatusClass::Transient), // rate limited
    (400..=499, StatusClass::Permanent),
    (500..=599, StatusClass::Transient),
];

/// Classify an HTTP status code. Codes outside the table are permanent.
pub fn classify_status(status: u16) -> StatusClass {
    STATUS_TABLE
        .iter()
        .find(|(range, _)| range.contains(&status))
        .map_or(StatusClass::Permanent, |(_, class)| *class)
}
