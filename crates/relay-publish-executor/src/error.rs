//! Error types for signing and publishing.

use std::time::Duration;
use thiserror::Error;

/// Why one relay did not accept one event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayRejection {
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The relay answered `OK false` with this message.
    #[error("{0}")]
    Rejected(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Signing failure.
#[derive(Error, Debug)]
pub enum SignerError {
    #[error("local signing failed: {0}")]
    Local(#[from] nostr_event_model::EventError),

    #[error("external signer failed: {0}")]
    External(String),
}

/// Failure of a one-shot publish.
#[derive(Error, Debug)]
pub enum ExecuteError {
    #[error("no relays to publish on")]
    NoRelays,

    /// Every targeted relay rejected the event or timed out.
    #[error("event {event_id} was rejected by all relays: {reason}")]
    AllRelaysFailed { event_id: String, reason: String },

    #[error("signing failed: {0}")]
    Signing(#[from] SignerError),
}

/// Result type alias using ExecuteError.
pub type ExecuteResult<T> = Result<T, ExecuteError>;
