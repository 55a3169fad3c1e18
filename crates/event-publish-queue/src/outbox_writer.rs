//! Ordered, fire-and-forget outbox writes.
//!
//! Every write from one queue goes through a single task, so a removal never
//! overtakes the put it follows. Failures are logged and dropped.

use nostr_event_model::LogicalKey;
use pending_event_outbox::{OutboxEntry, OutboxStore};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

enum OutboxCommand {
    Put(OutboxEntry),
    Remove(LogicalKey),
    /// Answered once every earlier command has been applied.
    Barrier(oneshot::Sender<()>),
}

pub(crate) struct OutboxWriter {
    tx: mpsc::UnboundedSender<OutboxCommand>,
}

impl OutboxWriter {
    /// Start the writer task. Must be called within a Tokio runtime.
    pub(crate) fn spawn(store: Arc<dyn OutboxStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    OutboxCommand::Put(entry) => {
                        let key = entry.key.clone();
                        if let Err(e) = store.put_pending_event(entry).await {
                            warn!(key = %key, error = %e, "Failed to persist pending event");
                        }
                    }
                    OutboxCommand::Remove(key) => {
                        if let Err(e) = store.remove_pending_event(&key).await {
                            warn!(key = %key, error = %e, "Failed to remove pending event");
                        }
                    }
                    OutboxCommand::Barrier(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Outbox writer stopped");
        });
        Self { tx }
    }

    pub(crate) fn put(&self, entry: OutboxEntry) {
        let _ = self.tx.send(OutboxCommand::Put(entry));
    }

    pub(crate) fn remove(&self, key: LogicalKey) {
        let _ = self.tx.send(OutboxCommand::Remove(key));
    }

    /// Wait until every write issued so far has been applied.
    pub(crate) async fn sync(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(OutboxCommand::Barrier(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}
