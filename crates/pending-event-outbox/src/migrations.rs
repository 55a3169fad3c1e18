//! Outbox schema migrations, tracked in the `migrations` table.

use crate::OutboxResult;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version.
pub const CURRENT_VERSION: i32 = 1;

pub fn run_migrations(conn: &Connection) -> OutboxResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM migrations",
        [],
        |row| row.get(0),
    )?;

    info!(current_version, target_version = CURRENT_VERSION, "Running outbox migrations");

    if current_version < 1 {
        migrate_v1_pending_events(conn)?;
    }

    Ok(())
}

fn record_migration(conn: &Connection, version: i32, name: &str) -> OutboxResult<()> {
    conn.execute(
        "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![version, name],
    )?;
    debug!(version, name, "Migration applied");
    Ok(())
}

/// V1: one row per logical key.
fn migrate_v1_pending_events(conn: &Connection) -> OutboxResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE pending_events (
            key TEXT PRIMARY KEY NOT NULL,
            event_json TEXT NOT NULL,
            write_relay_conf_json TEXT,
            created_at TEXT NOT NULL,
            succeeded_relays_json TEXT
        );
        ",
    )?;
    record_migration(conn, 1, "pending_events")
}
