//! Coalescing keys.
//!
//! Two events with the same key describe the same entity, so the newer one
//! replaces the older one in the publish buffer and the outbox. The format is
//! persisted, so it must stay stable across releases.

use crate::{UnsignedEvent, KIND_DELETE, KIND_KNOWLEDGE_NODE};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies "the current version of entity X".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalKey(String);

impl LogicalKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogicalKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for LogicalKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Derive the coalescing key of an event.
///
/// - deletion: `delete:<targetRef>`
/// - knowledge node: `node:<d>`
/// - anything else: `<kind>:<pubkey>:<d>`, or `<kind>:<pubkey>` without a d-tag
pub fn logical_key(event: &UnsignedEvent) -> LogicalKey {
    if event.kind == KIND_DELETE {
        let target = delete_target_ref(event).unwrap_or_default();
        return LogicalKey(format!("delete:{target}"));
    }
    address_key(event.kind, &event.pubkey, event.tag_value("d"))
}

/// The reference a deletion points at: its `a` tag, else its `e` tag.
pub fn delete_target_ref(event: &UnsignedEvent) -> Option<&str> {
    event.tag_value("a").or_else(|| event.tag_value("e"))
}

/// Key of the entity a deletion removes.
///
/// An `a` reference (`<kind>:<pubkey>:<d>`) maps to the key that entity was
/// buffered under. An `e` reference (a bare event id) is returned as is and
/// only matches nothing in the buffer.
pub fn target_logical_key(event: &UnsignedEvent) -> Option<LogicalKey> {
    if let Some(address) = event.tag_value("a") {
        let mut parts = address.splitn(3, ':');
        let kind = parts.next().and_then(|k| k.parse::<u16>().ok());
        let pubkey = parts.next();
        let d_tag = parts.next();
        if let (Some(kind), Some(pubkey)) = (kind, pubkey) {
            return Some(address_key(kind, pubkey, d_tag));
        }
        return Some(LogicalKey(address.to_string()));
    }
    event.tag_value("e").map(LogicalKey::from)
}

fn address_key(kind: u16, pubkey: &str, d_tag: Option<&str>) -> LogicalKey {
    match (kind, d_tag) {
        (KIND_KNOWLEDGE_NODE, d) => LogicalKey(format!("node:{}", d.unwrap_or_default())),
        (kind, Some(d)) => LogicalKey(format!("{kind}:{pubkey}:{d}")),
        (kind, None) => LogicalKey(format!("{kind}:{pubkey}")),
    }
}
