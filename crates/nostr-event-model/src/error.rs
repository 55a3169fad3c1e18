//! Error types for event construction, signing, and verification.

use thiserror::Error;

/// Errors that can occur while building, hashing, or signing events.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("verification error: {0}")]
    Verification(String),

    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// Result type alias using EventError.
pub type EventResult<T> = Result<T, EventError>;
