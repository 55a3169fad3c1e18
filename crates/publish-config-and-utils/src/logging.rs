//! Logging initialization.
//!
//! Thin wrapper over the observability crate so binaries only pick a level.

use observability::LogConfig;

/// Service name used in log lines when none is given.
const DEFAULT_SERVICE_NAME: &str = "notegraph-outbox";

/// Initialize logging for the default service at the given level.
///
/// JSONL goes to `~/.notegraph/logs/notegraph-outbox.jsonl` and compact
/// output to stderr. `RUST_LOG` still takes precedence over `level`.
pub fn init_logging(level: &str) {
    init_logging_for_service(DEFAULT_SERVICE_NAME, level);
}

/// Initialize logging under a custom service name.
pub fn init_logging_for_service(service_name: &str, level: &str) {
    observability::init_with_config(LogConfig {
        service_name: service_name.into(),
        default_level: level.into(),
        also_stderr: true,
        ..Default::default()
    });
}
