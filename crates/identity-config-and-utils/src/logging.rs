//! Logging initialization for identity runtime binaries.
//!
//! Thin wrappers over the observability package so binaries don't need to
//! assemble a `LogConfig` themselves.

use std::path::Path;

/// Initialize stderr logging at the given default level.
///
/// `RUST_LOG` still takes precedence over `level`.
///
/// ```ignore
/// init_logging("info");
/// tracing::info!("started");
/// ```
pub fn init_logging(level: &str) {
    observability::init_with_config(observability::LogConfig {
        service_name: "identity".into(),
        default_level: level.into(),
        ..Default::default()
    });
}

/// Initialize JSONL file logging, mirrored to stderr.
pub fn init_logging_to_file(level: &str, log_file: &Path) {
    observability::init_with_config(observability::LogConfig {
        service_name: "identity".into(),
        default_level: level.into(),
        log_path: Some(log_file.to_path_buf()),
        also_stderr: true,
    });
}
