//! SQLite-backed outbox on a dedicated executor thread.

use crate::{migrations, OutboxEntry, OutboxError, OutboxResult, OutboxStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nostr_event_model::{LogicalKey, UnsignedEvent, WriteRelayConf};
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::{debug, info, warn};

/// Raw row as read on the SQLite thread. Decoding happens outside `call()`.
struct PendingRow {
    key: String,
    event_json: String,
    write_relay_conf_json: Option<String>,
    created_at: String,
    succeeded_relays_json: Option<String>,
}

/// Durable outbox stored in `pending_events`.
///
/// The event column holds the event without its relay conf, which lives in
/// its own column.
#[derive(Clone)]
pub struct SqliteOutboxStore {
    conn: Connection,
}

impl SqliteOutboxStore {
    /// Open (creating if needed) the outbox database and run migrations.
    pub async fn open(path: &Path) -> OutboxResult<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        info!(path = %path.display(), "Opening outbox database");

        let conn = Connection::open(path)
            .await
            .map_err(|e| OutboxError::Connection(e.to_string()))?;

        conn.call(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
            Ok(())
        })
        .await?;

        Self::migrate(conn).await
    }

    /// Non-durable store with the same schema, for tests.
    pub async fn open_in_memory() -> OutboxResult<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| OutboxError::Connection(e.to_string()))?;
        Self::migrate(conn).await
    }

    async fn migrate(conn: Connection) -> OutboxResult<Self> {
        conn.call(|conn| {
            migrations::run_migrations(conn)
                .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
            Ok(())
        })
        .await
        .map_err(|e| OutboxError::Migration(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Number of stored entries.
    pub async fn count(&self) -> OutboxResult<usize> {
        let count: i64 = self
            .conn
            .call(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM pending_events", [], |row| row.get(0))?)
            })
            .await?;
        Ok(count as usize)
    }
}

fn decode_row(row: PendingRow) -> OutboxResult<OutboxEntry> {
    let mut event: UnsignedEvent = serde_json::from_str(&row.event_json)?;
    event.write_relay_conf = row
        .write_relay_conf_json
        .as_deref()
        .map(serde_json::from_str::<WriteRelayConf>)
        .transpose()?;
    let created_at = DateTime::parse_from_rfc3339(&row.created_at)
        .map_err(|e| OutboxError::InvalidData(format!("created_at for {}: {e}", row.key)))?
        .with_timezone(&Utc);
    let succeeded_relays = row
        .succeeded_relays_json
        .as_deref()
        .map(serde_json::from_str::<Vec<String>>)
        .transpose()?;

    Ok(OutboxEntry {
        key: LogicalKey::new(row.key),
        event,
        created_at,
        succeeded_relays,
    })
}

#[async_trait]
impl OutboxStore for SqliteOutboxStore {
    async fn get_pending_events(&self) -> OutboxResult<Vec<OutboxEntry>> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT key, event_json, write_relay_conf_json, created_at, succeeded_relays_json
                     FROM pending_events ORDER BY rowid",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(PendingRow {
                            key: row.get(0)?,
                            event_json: row.get(1)?,
                            write_relay_conf_json: row.get(2)?,
                            created_at: row.get(3)?,
                            succeeded_relays_json: row.get(4)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let key = row.key.clone();
            match decode_row(row) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(key = %key, error = %e, "Skipping unreadable outbox row"),
            }
        }
        Ok(entries)
    }

    async fn put_pending_event(&self, entry: OutboxEntry) -> OutboxResult<()> {
        let conf_json = entry
            .event
            .write_relay_conf
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let mut bare = entry.event;
        bare.write_relay_conf = None;
        let event_json = serde_json::to_string(&bare)?;
        let succeeded_json = entry
            .succeeded_relays
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let key = entry.key.into_inner();
        let created_at = entry.created_at.to_rfc3339();

        debug!(key = %key, "Persisting pending event");
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO pending_events
                        (key, event_json, write_relay_conf_json, created_at, succeeded_relays_json)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(key) DO UPDATE SET
                        event_json = excluded.event_json,
                        write_relay_conf_json = excluded.write_relay_conf_json,
                        succeeded_relays_json = excluded.succeeded_relays_json",
                    rusqlite::params![key, event_json, conf_json, created_at, succeeded_json],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn remove_pending_event(&self, key: &LogicalKey) -> OutboxResult<()> {
        let key = key.as_str().to_string();
        debug!(key = %key, "Removing pending event");
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM pending_events WHERE key = ?1", [key])?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr_event_model::{KIND_KNOWLEDGE_NODE, KIND_SHORT_TEXT_NOTE};
    use tempfile::tempdir;

    const PK: &str = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    fn node(d: &str, content: &str) -> UnsignedEvent {
        UnsignedEvent::new(
            KIND_KNOWLEDGE_NODE,
            PK,
            1_700_000_000,
            vec![vec!["d".to_string(), d.to_string()]],
            content,
        )
    }

    #[tokio::test]
    async fn test_put_list_remove() {
        let store = SqliteOutboxStore::open_in_memory().await.unwrap();
        store.put_pending_event(OutboxEntry::for_event(node("a", "1"))).await.unwrap();
        store.put_pending_event(OutboxEntry::for_event(node("b", "2"))).await.unwrap();

        let keys: Vec<String> = store
            .get_pending_events()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.key.into_inner())
            .collect();
        assert_eq!(keys, vec!["node:a", "node:b"]);

        store.remove_pending_event(&LogicalKey::from("node:a")).await.unwrap();
        store.remove_pending_event(&LogicalKey::from("node:missing")).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_row_is_skipped() {
        let store = SqliteOutboxStore::open_in_memory().await.unwrap();
        store
            .conn
            .call(|conn| {
                conn.execute(
                    "INSERT INTO pending_events (key, event_json, created_at)
                     VALUES ('bad', '{', 'nope')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();
        store.put_pending_event(OutboxEntry::for_event(node("a", "1"))).await.unwrap();

        let entries = store.get_pending_events().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key.as_str(), "node:a");
        assert_eq!(entries[0].event.content, "1");
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_put_replaces_in_place() {
        let store = SqliteOutboxStore::open_in_memory().await.unwrap();
        store.put_pending_event(OutboxEntry::for_event(node("a", "old"))).await.unwrap();
        store.put_pending_event(OutboxEntry::for_event(node("b", "b"))).await.unwrap();
        store.put_pending_event(OutboxEntry::for_event(node("a", "new"))).await.unwrap();

        let entries = store.get_pending_events().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key.as_str(), "node:a");
        assert_eq!(entries[0].event.content, "new");
    }

    #[tokio::test]
    async fn test_relay_conf_and_succeeded_relays_roundtrip() {
        let store = SqliteOutboxStore::open_in_memory().await.unwrap();
        let event = UnsignedEvent::new(KIND_SHORT_TEXT_NOTE, PK, 5, vec![], "hi")
            .with_write_relay_conf(WriteRelayConf::only(["wss://extra.example"]));
        let mut entry = OutboxEntry::for_event(event);
        entry.succeeded_relays = Some(vec!["wss://ok.example".to_string()]);
        store.put_pending_event(entry.clone()).await.unwrap();

        let loaded = store.get_pending_events().await.unwrap().remove(0);
        assert_eq!(loaded.event, entry.event);
        assert_eq!(loaded.succeeded_relays, entry.succeeded_relays);
        assert_eq!(loaded.created_at.timestamp(), entry.created_at.timestamp());
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("outbox.sqlite");

        {
            let store = SqliteOutboxStore::open(&path).await.unwrap();
            store.put_pending_event(OutboxEntry::for_event(node("a", "1"))).await.unwrap();
        }

        let reopened = SqliteOutboxStore::open(&path).await.unwrap();
        let entries = reopened.get_pending_events().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event.content, "1");
    }
}
