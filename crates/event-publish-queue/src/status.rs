use serde::Serialize;

/// A relay that is cooling down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackedOffRelay {
    pub url: String,
    /// Whole seconds until the relay is tried again, rounded up.
    pub retry_after_secs: u64,
}

/// Point-in-time view of a queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub pending_count: usize,
    pub flushing: bool,
    pub backed_off_relays: Vec<BackedOffRelay>,
}
