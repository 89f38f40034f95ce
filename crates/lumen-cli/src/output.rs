//! Output formatting for CLI

use clap::ValueEnum;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize>(data: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// Print rows as a table
pub fn print_table<T: Tabled>(rows: impl IntoIterator<Item = T>) {
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

/// Print rows in the selected format; text falls back to the table layout
pub fn print_rows<T: Tabled + Serialize>(rows: &[T], format: OutputFormat, empty: &str) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("{empty}");
        return Ok(());
    }
    print_table(rows);
    Ok(())
}
