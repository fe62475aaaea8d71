//! Configuration, paths and logging setup shared by the identity runtime crates.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, SessionConfig, DEFAULT_LOG_LEVEL, DEFAULT_MIN_REARM_DELAY_MS,
    DEFAULT_PROACTIVE_MARGIN_SECS, DEFAULT_STORAGE_NAMESPACE,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, init_logging_to_file};
pub use paths::Paths;
