//! Identity CLI - evaluate feature flags and exercise the session runtime.

mod commands;
mod output;
mod simulated;

use clap::{Parser, Subcommand};
use identity_config_and_utils::{Config, Paths};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Identity CLI - Inspect flags, sessions and configuration.
#[derive(Parser)]
#[command(name = "identity")]
#[command(about = "Tools for the identity session runtime")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Write JSONL logs to this file instead of stderr only
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate feature flags
    Flags {
        #[command(subcommand)]
        command: FlagCommands,
    },

    /// Exercise the session runtime
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum FlagCommands {
    /// Evaluate a JSON flag document for a user
    Eval {
        /// Flag document (array of definitions or object keyed by flag key)
        #[arg(long)]
        file: PathBuf,
        /// Evaluate only this flag
        #[arg(long)]
        key: Option<String>,
        /// User to evaluate for; omit for an anonymous evaluation
        #[arg(long)]
        user_id: Option<String>,
        /// Role held by the user (repeatable)
        #[arg(long = "role")]
        roles: Vec<String>,
        /// Permission held by the user (repeatable)
        #[arg(long = "permission")]
        permissions: Vec<String>,
        /// Tenant override as key=true|false (repeatable)
        #[arg(long = "override", value_parser = commands::parse_override)]
        overrides: Vec<(String, bool)>,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Issue concurrent token requests against a simulated backend
    Simulate {
        /// Number of concurrent callers
        #[arg(long, default_value = "5")]
        callers: usize,
        /// Seconds until the seeded token expires (negative = already expired)
        #[arg(long, default_value = "-5", allow_hyphen_values = true)]
        expires_in: i64,
        /// Simulated backend latency per refresh
        #[arg(long, default_value = "200")]
        latency_ms: u64,
        /// Make the backend reject the refresh token
        #[arg(long)]
        reject: bool,
        /// Persist the session to the session file
        #[arg(long)]
        persist: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let (config, paths) = match load_config() {
        Ok(loaded) => loaded,
        Err(e) => {
            output::print_error(&e.to_string(), &cli.format);
            std::process::exit(1);
        }
    };

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.log_level.clone());
    match &cli.log_file {
        Some(log_file) => identity_config_and_utils::init_logging_to_file(&level, log_file),
        None => identity_config_and_utils::init_logging(&level),
    }
    debug!(config_file = %paths.config_file().display(), "Configuration loaded");

    let result = match cli.command {
        Commands::Flags { command } => match command {
            FlagCommands::Eval {
                file,
                key,
                user_id,
                roles,
                permissions,
                overrides,
            } => commands::flags_eval(
                &file,
                commands::EvalSubject {
                    user_id,
                    roles,
                    permissions,
                },
                overrides,
                key.as_deref(),
                &cli.format,
            ),
        },
        Commands::Session { command } => match command {
            SessionCommands::Simulate {
                callers,
                expires_in,
                latency_ms,
                reject,
                persist,
            } => {
                let params = commands::SimulateParams {
                    callers,
                    expires_in_secs: expires_in,
                    latency: Duration::from_millis(latency_ms),
                    reject_refresh: reject,
                };
                commands::session_simulate(params, persist, &config, &paths, &cli.format).await
            }
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => commands::config_show(&config, &paths, &cli.format),
        },
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e), &cli.format);
        std::process::exit(1);
    }
}

fn load_config() -> anyhow::Result<(Config, Paths)> {
    let paths = Paths::new()?;
    let config = Config::load(&paths)?;
    Ok((config, paths))
}
