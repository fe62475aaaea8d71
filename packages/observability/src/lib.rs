//! # Observability
//!
//! Tracing setup for the identity session runtime.
//!
//! Library crates only emit `tracing` events. Binaries call
//! [`init`] or [`init_with_config`] once at startup to decide where those
//! events go:
//!
//! - no `log_path`: compact human-readable lines on stderr
//! - with `log_path`: structured JSONL appended to the file, optionally
//!   mirrored to stderr
//!
//! The JSONL layer never writes credential values. Fields named
//! `access_token`, `refresh_token`, `password` or `authorization` are
//! replaced with a redaction marker before serialization.
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "identity-cli".into(),
//!         default_level: "debug".into(),
//!         log_path: Some("/tmp/identity.jsonl".into()),
//!         ..Default::default()
//!     });
//!     tracing::info!("ready");
//! }
//! ```

mod file_writer;
mod json_layer;

use std::io;
use std::path::PathBuf;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use file_writer::{AppendLogWriter, AppendWriterFactory};
pub use json_layer::{is_sensitive_field, JsonLayer, LogEntry, REDACTED};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every JSONL line.
    pub service_name: String,

    /// Default filter directive (e.g. "debug", "info,session_runtime=trace").
    /// `RUST_LOG` takes precedence when set.
    pub default_level: String,

    /// Optional JSONL log file. When `None`, logs go to stderr only.
    pub log_path: Option<PathBuf>,

    /// Mirror events to stderr when a log file is configured.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize logging with default settings for the given service.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with a custom configuration.
///
/// Safe to call more than once; later calls are ignored because a global
/// subscriber can only be installed once per process.
pub fn init_with_config(config: LogConfig) {
    let Some(log_path) = config.log_path.clone() else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter(&config.default_level))
            .with_target(true)
            .with_writer(io::stderr)
            .compact()
            .try_init();
        return;
    };

    let writer = match AppendLogWriter::new(&log_path) {
        Ok(writer) => writer,
        Err(e) => {
            eprintln!(
                "failed to open log file {}: {}; falling back to stderr",
                log_path.display(),
                e
            );
            return init_with_config(LogConfig {
                log_path: None,
                ..config
            });
        }
    };

    let json_layer = JsonLayer::new(config.service_name.clone(), AppendWriterFactory::new(writer));

    let stderr_layer = config.also_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .compact()
            .with_writer(io::stderr)
            .with_filter(env_filter(&config.default_level))
    });

    let _ = tracing_subscriber::registry()
        .with(json_layer.with_filter(env_filter(&config.default_level)))
        .with(stderr_layer)
        .try_init();

    tracing::info!(
        log_path = %log_path.display(),
        service = %config.service_name,
        "observability initialized"
    );
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

pub use tracing::{debug, error, info, instrument, trace, warn};
