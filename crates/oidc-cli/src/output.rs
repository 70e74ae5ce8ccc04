//! Output formatting utilities.

use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::OutputFormat;
use crate::error::CliResult;

/// Prints a success message.
pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Prints an error message.
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Prints a warning message.
pub fn warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}

/// Prints an info message.
pub fn info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Outputs rows in the specified format. `Quiet` prints `id` of each row.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn output<T: Tabled + Serialize>(data: &[T], format: OutputFormat, id: impl Fn(&T) -> &str) -> CliResult<()> {
    match format {
        OutputFormat::Table => {
            if data.is_empty() {
                info("No results found.");
            } else {
                println!("{}", Table::new(data).with(Style::rounded()));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(data)?),
        OutputFormat::Quiet => {
            for row in data {
                println!("{}", id(row));
            }
        }
    }
    Ok(())
}

/// Outputs a single JSON document with a heading in table mode.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn output_document<T: Serialize>(heading: &str, item: &T, format: OutputFormat) -> CliResult<()> {
    let json = serde_json::to_string_pretty(item)?;
    match format {
        OutputFormat::Table => println!("{}\n{json}", format!("=== {heading} ===").bold()),
        OutputFormat::Json | OutputFormat::Quiet => println!("{json}"),
    }
    Ok(())
}
