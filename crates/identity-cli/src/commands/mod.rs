//! CLI command implementations.

mod config;
mod flags;
mod session;

pub use config::config_show;
pub use flags::{flags_eval, parse_override, EvalSubject};
pub use session::{session_simulate, SimulateParams};
