//! Reliable publication of locally authored events.
//!
//! ```text
//! enqueue ──▶ buffer (one slot per LogicalKey) ──debounce──▶ flush
//!               │                                           │
//!               ▼                                           ▼
//!            outbox (durable mirror)              sign ─▶ publish to relays
//!                                                           │
//!                                        backoff tracker ◀──┘──▶ on_results
//! ```
//!
//! - Re-enqueuing a key replaces the buffered event.
//! - At most one flush runs at a time.
//! - An event leaves the buffer only after a relay accepted it.
//! - Failing relays cool down exponentially; a retry timer fires when the
//!   earliest cooldown ends.
//! - Deletes of still-buffered events cancel them locally.

mod backoff;
mod config;
mod outbox_writer;
mod queue;
mod status;

#[cfg(test)]
mod tests;

pub use backoff::{RelayBackoffState, RelayBackoffTracker};
pub use config::QueueConfig;
pub use queue::{PublishQueue, PublishResultsSink};
pub use status::{BackedOffRelay, QueueStatus};
