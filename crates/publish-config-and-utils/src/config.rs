//! Configuration for the publish pipeline.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Quiet period before buffered edits are flushed.
pub const DEFAULT_DEBOUNCE_MS: u64 = 1_000;
/// Hard deadline for one relay to acknowledge one event.
pub const DEFAULT_PUBLISH_TIMEOUT_MS: u64 = 5_000;
/// First backoff step for a failing relay (doubled per failure).
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
/// Upper bound on a relay's cooldown.
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 60_000;
/// Shortest delay the retry scheduler will arm.
pub const DEFAULT_RETRY_FLOOR_MS: u64 = 100;

const ENV_LOG_LEVEL: &str = "NOTEGRAPH_LOG_LEVEL";
const ENV_RELAYS: &str = "NOTEGRAPH_RELAYS";

/// Pipeline configuration, stored as JSON at `~/.notegraph/config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Debounce window in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Maximum buffered events attempted per flush. `None` drains everything.
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// Per-relay publish deadline in milliseconds.
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    #[serde(default = "default_retry_floor_ms")]
    pub retry_floor_ms: u64,
    /// Fallback relays used when the user has none of their own.
    #[serde(default)]
    pub default_relays: Vec<String>,
    /// The user's own write relays.
    #[serde(default)]
    pub user_relays: Vec<String>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_publish_timeout_ms() -> u64 {
    DEFAULT_PUBLISH_TIMEOUT_MS
}

fn default_backoff_base_ms() -> u64 {
    DEFAULT_BACKOFF_BASE_MS
}

fn default_backoff_max_ms() -> u64 {
    DEFAULT_BACKOFF_MAX_MS
}

fn default_retry_floor_ms() -> u64 {
    DEFAULT_RETRY_FLOOR_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            batch_size: None,
            publish_timeout_ms: DEFAULT_PUBLISH_TIMEOUT_MS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            retry_floor_ms: DEFAULT_RETRY_FLOOR_MS,
            default_relays: Vec::new(),
            user_relays: Vec::new(),
        }
    }
}

impl Config {
    /// Load from the config file if present, then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();
        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override values from the environment.
    ///
    /// `NOTEGRAPH_LOG_LEVEL` replaces the log level, `NOTEGRAPH_RELAYS`
    /// (comma separated) replaces the default relays.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.trim().is_empty()) {
            self.log_level = level.trim().to_string();
        }
        if let Some(relays) = lookup(ENV_RELAYS) {
            let relays: Vec<String> = relays
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect();
            if !relays.is_empty() {
                self.default_relays = relays;
            }
        }
    }

    /// Reject relay URLs that are not websocket URLs and nonsensical timings.
    pub fn validate(&self) -> CoreResult<()> {
        for relay in self.default_relays.iter().chain(self.user_relays.iter()) {
            let url = Url::parse(relay)?;
            if url.scheme() != "wss" && url.scheme() != "ws" {
                return Err(CoreError::Config(format!(
                    "relay {relay} must use ws:// or wss://"
                )));
            }
        }
        if self.publish_timeout_ms == 0 {
            return Err(CoreError::Config(
                "publish_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            return Err(CoreError::Config(
                "backoff_base_ms must not exceed backoff_max_ms".to_string(),
            ));
        }
        if self.batch_size == Some(0) {
            return Err(CoreError::Config(
                "batch_size must be greater than zero when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn retry_floor(&self) -> Duration {
        Duration::from_millis(self.retry_floor_ms)
    }
}
