//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of rows, or `json` for the JSON format
pub fn print_table<T: Tabled, J: Serialize>(rows: &[T], json: &J, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(json) {
                println!("{}", json);
            }
        }
    }
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Render a resolved value for a table cell. Strings print unquoted.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => color_status(s),
        Value::Bool(true) => "true".green().to_string(),
        Value::Bool(false) => "false".red().to_string(),
        other => other.to_string(),
    }
}

/// Color a health status string
fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "green" => status.green().to_string(),
        "orange" | "yellow" => status.yellow().to_string(),
        "red" => status.red().to_string(),
        "gray" | "grey" | "unknown" => status.dimmed().to_string(),
        _ => status.to_string(),
    }
}
