use chrono::{DateTime, Utc};
use nostr_event_model::{logical_key, LogicalKey, UnsignedEvent};
use serde::{Deserialize, Serialize};

/// Durable mirror of one publish buffer slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub key: LogicalKey,
    /// The unsigned event, including its write relay conf.
    pub event: UnsignedEvent,
    pub created_at: DateTime<Utc>,
    /// Relays that already accepted this event, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub succeeded_relays: Option<Vec<String>>,
}

impl OutboxEntry {
    pub fn new(key: LogicalKey, event: UnsignedEvent) -> Self {
        Self {
            key,
            event,
            created_at: Utc::now(),
            succeeded_relays: None,
        }
    }

    /// Entry keyed by the event's own logical key.
    pub fn for_event(event: UnsignedEvent) -> Self {
        Self::new(logical_key(&event), event)
    }
}
