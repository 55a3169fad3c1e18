//! # Observability
//!
//! Logging setup for every notegraph process that publishes events.
//!
//! Library crates only ever use `tracing` macros. Binaries call
//! [`init`] or [`init_with_config`] once at startup, which installs:
//!
//! - a JSON-lines layer appending to `~/.notegraph/logs/<service>.jsonl`
//! - an optional compact stderr layer for foreground runs
//!
//! Both layers honour `RUST_LOG`, falling back to the configured level.
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init("notegraph-outbox");
//!     tracing::info!(relay = "wss://relay.example", "publishing");
//! }
//! ```

mod json_layer;
mod writer;

use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use json_layer::{JsonLayer, LogEntry};
pub use writer::{AppendWriter, AppendWriterFactory};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, written into every JSON line.
    pub service_name: String,

    /// Default level filter when `RUST_LOG` is not set.
    pub default_level: String,

    /// Custom JSONL path. Defaults to `~/.notegraph/logs/<service>.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Write JSONL to a file at all.
    pub file_output: bool,

    /// Also emit compact human-readable logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            file_output: true,
            also_stderr: false,
        }
    }
}

impl LogConfig {
    /// Resolve where the JSONL file goes, if anywhere.
    pub fn resolved_log_path(&self) -> Option<PathBuf> {
        if !self.file_output {
            return None;
        }
        self.log_path
            .clone()
            .or_else(|| default_log_path(&self.service_name))
    }
}

fn default_log_path(service_name: &str) -> Option<PathBuf> {
    dirs::home_dir().map(|home| {
        home.join(".notegraph")
            .join("logs")
            .join(format!("{service_name}.jsonl"))
    })
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize logging with defaults for the given service.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with a custom configuration.
///
/// Calling this twice is harmless: the second global subscriber is rejected
/// and the first stays installed. A log file that cannot be opened degrades to
/// stderr-only output instead of aborting the process.
pub fn init_with_config(config: LogConfig) {
    let mut file_error = None;
    let json_layer = match config.resolved_log_path() {
        Some(path) => match AppendWriter::open(&path) {
            Ok(writer) => Some(
                JsonLayer::new(config.service_name.clone(), AppendWriterFactory::new(writer))
                    .with_filter(env_filter(&config.default_level)),
            ),
            Err(err) => {
                file_error = Some((path, err));
                None
            }
        },
        None => None,
    };

    let stderr_wanted = config.also_stderr || json_layer.is_none();
    let stderr_layer = stderr_wanted.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(env_filter(&config.default_level))
    });

    let installed = tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if let Some((path, err)) = file_error {
        tracing::warn!(path = %path.display(), error = %err, "log file unavailable, using stderr");
    }
    if installed {
        tracing::debug!(service = %config.service_name, "observability initialized");
    }
}

pub use tracing::{debug, error, info, instrument, trace, warn};
