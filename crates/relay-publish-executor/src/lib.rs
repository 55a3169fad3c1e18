//! Signing and relay publishing.
//!
//! This crate provides:
//! - sign_events: batch signing with a local key or an external signer
//! - publish_to_relays: one event to many relays with a per-relay deadline
//! - execute / republish_events: one-shot, non-queued publishing
//! - WebSocketRelay: NIP-01 relay capability over WebSockets

mod deps;
mod error;
mod execute;
mod publish;
mod relays;
mod signer;
mod websocket;

pub use deps::{PublishDeps, PublishDepsProvider};
pub use error::{ExecuteError, ExecuteResult, RelayRejection, SignerError};
pub use execute::{execute, republish_events, PublishPlan};
pub use publish::{
    publish_to_relays, relay_tallies, OutcomeStatus, PerRelayOutcome, PublishResults,
    PublishResultsOfEvent, RelayCapability, RelayTally, DEFAULT_PUBLISH_TIMEOUT,
};
pub use relays::{normalize_relay_url, resolve_relays, RelayLists};
pub use signer::{sign_events, ExternalSigner, Signer, User};
pub use websocket::WebSocketRelay;
