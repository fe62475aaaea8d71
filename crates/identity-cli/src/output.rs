//! Output formatting for the CLI.

use clap::ValueEnum;
use serde::Serialize;

/// Output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print output in the specified format.
pub fn print<T: Serialize + std::fmt::Display>(value: &T, format: &OutputFormat) {
    match format {
        OutputFormat::Text => print!("{}", value),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(value) {
                println!("{}", json);
            } else {
                print!("{}", value);
            }
        }
    }
}

/// Print an error message.
pub fn print_error(message: &str, format: &OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("Error: {}", message),
        OutputFormat::Json => {
            let body = serde_json::json!({ "status": "error", "message": message });
            eprintln!("{}", body);
        }
    }
}

/// Format a labelled row.
pub fn row(f: &mut std::fmt::Formatter<'_>, label: &str, value: impl std::fmt::Display) -> std::fmt::Result {
    writeln!(f, "  {:<18} {}", format!("{}:", label), value)
}

/// Format a heading followed by a divider.
pub fn heading(f: &mut std::fmt::Formatter<'_>, text: &str) -> std::fmt::Result {
    writeln!(f, "{}", text)?;
    writeln!(f, "{}", "-".repeat(50))
}
