//! Publish queue behavior tests.
//!
//! - `harness.rs`      - mock relay, deps provider and queue wiring
//! - `coalescing.rs`   - one buffer slot per logical key
//! - `ordering.rs`     - single-flight flushes and FIFO across cycles
//! - `relay_failure.rs` - partial failure, timeouts, backoff and retry
//! - `replay.rs`       - outbox mirroring, replay, teardown and destroy
//! - `deletes.rs`      - delete fast path

mod relay_failure;
