use publish_config_and_utils::{
    Config, DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_MAX_MS, DEFAULT_DEBOUNCE_MS,
    DEFAULT_PUBLISH_TIMEOUT_MS, DEFAULT_RETRY_FLOOR_MS,
};
use std::time::Duration;

/// Timing and batching of a [`PublishQueue`](crate::PublishQueue).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Quiet period after the last enqueue before a flush starts.
    pub debounce: Duration,
    /// Maximum events attempted per flush. `None` drains the whole buffer.
    pub batch_size: Option<usize>,
    /// Deadline for one relay to acknowledge one event.
    pub publish_timeout: Duration,
    /// Cooldown after the first failure, doubled per further failure.
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Shortest delay the retry timer is armed with.
    pub retry_floor: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            batch_size: None,
            publish_timeout: Duration::from_millis(DEFAULT_PUBLISH_TIMEOUT_MS),
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
            backoff_max: Duration::from_millis(DEFAULT_BACKOFF_MAX_MS),
            retry_floor: Duration::from_millis(DEFAULT_RETRY_FLOOR_MS),
        }
    }
}

impl From<&Config> for QueueConfig {
    fn from(config: &Config) -> Self {
        Self {
            debounce: config.debounce(),
            batch_size: config.batch_size,
            publish_timeout: config.publish_timeout(),
            backoff_base: config.backoff_base(),
            backoff_max: config.backoff_max(),
            retry_floor: config.retry_floor(),
        }
    }
}
