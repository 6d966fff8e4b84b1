//! Output formatting utilities

use autopause_lib::models::{Outcome, ProvisioningState, Verdict};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
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

/// One row of a two-column detail table
#[derive(Tabled)]
pub struct FieldRow {
    #[tabled(rename = "Field")]
    pub field: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl FieldRow {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Print a titled two-column table
pub fn print_fields(title: &str, rows: Vec<FieldRow>) {
    println!("{}", title.bold());
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a window as whole minutes
pub fn format_minutes(duration: std::time::Duration) -> String {
    format!("{}m", duration.as_secs() / 60)
}

pub fn color_state(state: ProvisioningState) -> String {
    let text = state.as_str();
    match state {
        ProvisioningState::Succeeded => text.green().to_string(),
        ProvisioningState::Suspended | ProvisioningState::Paused => text.blue().to_string(),
        ProvisioningState::Failed | ProvisioningState::Deleting => text.red().to_string(),
        _ => text.yellow().to_string(),
    }
}

pub fn color_verdict(verdict: Verdict) -> String {
    let text = verdict.as_str();
    match verdict {
        Verdict::Idle => text.red().bold().to_string(),
        Verdict::Active => text.green().to_string(),
        Verdict::RecentlyResumed => text.cyan().to_string(),
        Verdict::NotReady => text.yellow().to_string(),
    }
}

pub fn color_outcome(outcome: Outcome) -> String {
    let text = outcome.as_str();
    match outcome {
        Outcome::Paused => text.red().bold().to_string(),
        Outcome::WouldPause => text.yellow().bold().to_string(),
        Outcome::Skipped => text.dimmed().to_string(),
    }
}
