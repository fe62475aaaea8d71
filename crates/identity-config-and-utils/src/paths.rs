//! File system paths for the identity runtime.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Directory under the home directory holding runtime files.
const BASE_DIR_NAME: &str = ".identity-session";

/// Manages file system paths for the identity runtime.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory (~/.identity-session)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.identity-session`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory.
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (`<base>/config.json`).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the persisted session file (`<base>/session.json`).
    pub fn session_file(&self) -> PathBuf {
        self.base_dir.join("session.json")
    }

    /// Get the logs directory (`<base>/logs`).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the JSONL log file (`<base>/logs/identity.jsonl`).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("identity.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
