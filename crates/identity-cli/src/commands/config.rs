//! Configuration commands.

use crate::output::{self, OutputFormat};
use anyhow::Result;
use identity_config_and_utils::{Config, Paths};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Serialize)]
struct ConfigReport<'a> {
    config_file: String,
    config_file_exists: bool,
    session_file: String,
    log_file: String,
    #[serde(flatten)]
    config: &'a Config,
}

impl fmt::Display for ConfigReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let session = &self.config.session;
        output::heading(f, "Configuration")?;
        let source = if self.config_file_exists {
            self.config_file.clone()
        } else {
            format!("{} (not found, using defaults)", self.config_file)
        };
        output::row(f, "Config file", source)?;
        output::row(f, "Session file", &self.session_file)?;
        output::row(f, "Log file", &self.log_file)?;
        output::row(f, "Log level", &self.config.log_level)?;
        output::row(f, "Namespace", &self.config.storage_namespace)?;
        output::row(f, "Proactive margin", format!("{} s", session.proactive_margin_secs))?;
        output::row(f, "Min rearm delay", format!("{} ms", session.min_rearm_delay_ms))?;
        output::row(f, "Refresh attempts", session.refresh_max_attempts)?;
        output::row(
            f,
            "Refresh backoff",
            format!(
                "{}..{} ms",
                session.refresh_initial_delay_ms, session.refresh_max_delay_ms
            ),
        )
    }
}

/// Show the effective configuration and where it came from.
pub fn config_show(config: &Config, paths: &Paths, format: &OutputFormat) -> Result<()> {
    let config_file = paths.config_file();
    let report = ConfigReport {
        config_file_exists: config_file.exists(),
        config_file: config_file.display().to_string(),
        session_file: paths.session_file().display().to_string(),
        log_file: paths.log_file().display().to_string(),
        config,
    };
    output::print(&report, format);
    Ok(())
}
