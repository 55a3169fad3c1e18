use crate::{OutboxEntry, OutboxResult};
use async_trait::async_trait;
use nostr_event_model::LogicalKey;

/// Persistence contract for pending events.
///
/// Implementations keep at most one entry per key; `put` replaces an existing
/// entry in place. `get_pending_events` returns entries in first-insertion
/// order.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    async fn get_pending_events(&self) -> OutboxResult<Vec<OutboxEntry>>;

    async fn put_pending_event(&self, entry: OutboxEntry) -> OutboxResult<()>;

    /// Removing a key that is not stored is not an error.
    async fn remove_pending_event(&self, key: &LogicalKey) -> OutboxResult<()>;
}
