//! Configuration management for the identity runtime.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default lead time before expiry at which tokens are refreshed.
pub const DEFAULT_PROACTIVE_MARGIN_SECS: u64 = 60;

/// Default floor between two consecutive proactive refreshes.
pub const DEFAULT_MIN_REARM_DELAY_MS: u64 = 1_000;

/// Default key namespace for persisted session data.
pub const DEFAULT_STORAGE_NAMESPACE: &str = "identity";

const ENV_LOG_LEVEL: &str = "IDENTITY_LOG_LEVEL";
const ENV_PROACTIVE_MARGIN_SECS: &str = "IDENTITY_PROACTIVE_MARGIN_SECS";

/// Session timing and refresh retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds before expiry at which a token counts as expired for refresh purposes.
    pub proactive_margin_secs: u64,
    /// Minimum delay before the proactive scheduler fires again after a refresh.
    pub min_rearm_delay_ms: u64,
    /// Backend attempts per refresh ticket (1 = no retry).
    pub refresh_max_attempts: u32,
    /// Initial backoff between transient refresh failures.
    pub refresh_initial_delay_ms: u64,
    /// Backoff ceiling.
    pub refresh_max_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            proactive_margin_secs: DEFAULT_PROACTIVE_MARGIN_SECS,
            min_rearm_delay_ms: DEFAULT_MIN_REARM_DELAY_MS,
            refresh_max_attempts: 1,
            refresh_initial_delay_ms: 500,
            refresh_max_delay_ms: 5_000,
        }
    }
}

/// Main runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Session timing settings.
    #[serde(default)]
    pub session: SessionConfig,
    /// Prefix for persisted session keys.
    #[serde(default = "default_storage_namespace")]
    pub storage_namespace: String,
}

fn default_storage_namespace() -> String {
    DEFAULT_STORAGE_NAMESPACE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            session: SessionConfig::default(),
            storage_namespace: default_storage_namespace(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Load configuration from the config file, falling back to defaults.
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

    /// Reject settings the session runtime cannot operate with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.session.refresh_max_attempts == 0 {
            return Err(CoreError::Config(
                "session.refresh_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.session.refresh_initial_delay_ms > self.session.refresh_max_delay_ms {
            return Err(CoreError::Config(
                "session.refresh_initial_delay_ms exceeds session.refresh_max_delay_ms".to_string(),
            ));
        }
        if self.storage_namespace.trim().is_empty() {
            return Err(CoreError::Config(
                "storage_namespace must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Override settings from environment variables.
    ///
    /// Takes the lookup as a function so tests don't touch process state.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.trim().is_empty()) {
            self.log_level = level;
        }

        if let Some(raw) = lookup(ENV_PROACTIVE_MARGIN_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.session.proactive_margin_secs = secs,
                Err(_) => tracing::warn!(
                    value = %raw,
                    "Ignoring invalid {}",
                    ENV_PROACTIVE_MARGIN_SECS
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.session.proactive_margin_secs, 60);
        assert_eq!(config.session.refresh_max_attempts, 1);
        assert_eq!(config.storage_namespace, DEFAULT_STORAGE_NAMESPACE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_from_file_with_partial_session() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        std::fs::write(
            &config_path,
            r#"{ "log_level": "debug", "session": { "proactive_margin_secs": 30 } }"#,
        )
        .unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.session.proactive_margin_secs, 30);
        assert_eq!(config.session.min_rearm_delay_ms, DEFAULT_MIN_REARM_DELAY_MS);
        assert_eq!(config.storage_namespace, DEFAULT_STORAGE_NAMESPACE);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let mut config = Config::default();
        config.session.refresh_max_attempts = 3;
        config.storage_namespace = "tenant-a".to_string();
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.session, SessionConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("IDENTITY_LOG_LEVEL", "trace"),
            ("IDENTITY_PROACTIVE_MARGIN_SECS", "15"),
        ]));
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.session.proactive_margin_secs, 15);
    }

    #[test]
    fn test_invalid_margin_env_is_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[("IDENTITY_PROACTIVE_MARGIN_SECS", "soon")]));
        assert_eq!(config.session.proactive_margin_secs, DEFAULT_PROACTIVE_MARGIN_SECS);
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.session.refresh_max_attempts = 0;
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_backoff() {
        let mut config = Config::default();
        config.session.refresh_initial_delay_ms = 10_000;
        config.session.refresh_max_delay_ms = 1_000;
        assert!(config.validate().is_err());
    }
}
