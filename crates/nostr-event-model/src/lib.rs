//! Event model for the notegraph publish pipeline.
//!
//! This crate provides:
//! - Event, UnsignedEvent, EventTemplate: NIP-01 event shapes
//! - WriteRelayConf: per-event override of the targeted relay lists
//! - LogicalKey: coalescing key so repeated edits share one buffer slot
//! - Local BIP-340 signing and verification

mod error;
mod event;
mod keys;
mod logical_key;

pub use error::{EventError, EventResult};
pub use event::{
    Event, EventTemplate, UnsignedEvent, WriteRelayConf, KIND_CONTACTS, KIND_DELETE,
    KIND_KNOWLEDGE_NODE, KIND_RELAY_LIST, KIND_SHORT_TEXT_NOTE,
};
pub use keys::{
    finalize_event, generate_secret_key, get_event_hash, parse_secret_key, public_key_hex,
    serialize_event, verify_event,
};
pub use logical_key::{delete_target_ref, logical_key, target_logical_key, LogicalKey};
