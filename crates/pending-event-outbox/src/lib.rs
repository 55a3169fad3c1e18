//! Outbox for reliable event delivery.
//!
//! This crate provides:
//! - OutboxStore: the persistence contract the publish queue writes through
//! - SqliteOutboxStore: durable store on a dedicated SQLite thread
//! - MemoryOutboxStore: in-process store for tests and embedding

mod entry;
mod error;
mod memory;
mod migrations;
mod sqlite;
mod store;

pub use entry::OutboxEntry;
pub use error::{OutboxError, OutboxResult};
pub use memory::MemoryOutboxStore;
pub use sqlite::SqliteOutboxStore;
pub use store::OutboxStore;
