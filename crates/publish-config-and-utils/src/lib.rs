//! Configuration, runtime paths, and logging setup for the publish pipeline.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_MAX_MS, DEFAULT_DEBOUNCE_MS,
    DEFAULT_LOG_LEVEL, DEFAULT_PUBLISH_TIMEOUT_MS, DEFAULT_RETRY_FLOOR_MS,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, init_logging_for_service};
pub use paths::Paths;
