//! File system paths used by the publish pipeline.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Name of the per-user base directory under `$HOME`.
const BASE_DIR_NAME: &str = ".notegraph";
/// SQLite file holding pending outbox entries.
const OUTBOX_DATABASE_NAME: &str = "outbox.sqlite";

/// Runtime paths rooted at `~/.notegraph`.
#[derive(Debug, Clone)]
pub struct Paths {
    base_dir: PathBuf,
}

impl Paths {
    /// Resolve paths from the current user's home directory.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;
        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Use a custom base directory (tests, portable installs).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// `~/.notegraph/config.json`
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// `~/.notegraph/outbox.sqlite`
    pub fn outbox_database_file(&self) -> PathBuf {
        self.base_dir.join(OUTBOX_DATABASE_NAME)
    }

    /// `~/.notegraph/logs`
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// JSONL log file for one service.
    pub fn service_log_file(&self, service_name: &str) -> PathBuf {
        self.logs_dir().join(format!("{service_name}.jsonl"))
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_paths_with_base_dir() {
        let base = PathBuf::from("/tmp/test-notegraph");
        let paths = Paths::with_base_dir(base.clone());

        assert_eq!(paths.base_dir(), &base);
        assert_eq!(paths.config_file(), base.join("config.json"));
        assert_eq!(paths.outbox_database_file(), base.join("outbox.sqlite"));
        assert_eq!(paths.logs_dir(), base.join("logs"));
        assert_eq!(
            paths.service_log_file("notegraph-outbox"),
            base.join("logs/notegraph-outbox.jsonl")
        );
    }

    #[test]
    fn test_ensure_dirs_is_idempotent() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("notegraph");
        let paths = Paths::with_base_dir(base.clone());

        assert!(!base.exists());
        paths.ensure_dirs().unwrap();
        paths.ensure_dirs().unwrap();

        assert!(base.is_dir());
        assert!(paths.logs_dir().is_dir());
    }
}
