use crate::{OutboxEntry, OutboxResult, OutboxStore};
use async_trait::async_trait;
use indexmap::IndexMap;
use nostr_event_model::LogicalKey;
use parking_lot::Mutex;
use std::sync::Arc;

/// In-process outbox. Clones share the same entries, so a store can outlive
/// the queue that wrote to it.
#[derive(Clone, Default)]
pub struct MemoryOutboxStore {
    entries: Arc<Mutex<IndexMap<LogicalKey, OutboxEntry>>>,
}

impl MemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn contains(&self, key: &LogicalKey) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn get(&self, key: &LogicalKey) -> Option<OutboxEntry> {
        self.entries.lock().get(key).cloned()
    }
}

#[async_trait]
impl OutboxStore for MemoryOutboxStore {
    async fn get_pending_events(&self) -> OutboxResult<Vec<OutboxEntry>> {
        Ok(self.entries.lock().values().cloned().collect())
    }

    async fn put_pending_event(&self, entry: OutboxEntry) -> OutboxResult<()> {
        self.entries.lock().insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn remove_pending_event(&self, key: &LogicalKey) -> OutboxResult<()> {
        self.entries.lock().shift_remove(key);
        Ok(())
    }
}
