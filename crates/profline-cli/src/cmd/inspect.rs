//! `profline inspect` - show what is waiting in the store without draining it

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use profline_core::{Record, SharedStore};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Store file (default: from config)
    #[arg(short, long)]
    pub storage: Option<PathBuf>,

    /// Print raw JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Columns shown per record
const COLUMNS: [&str; 5] = ["name", "sex", "job", "birthdate", "age"];

pub fn run(args: InspectArgs, config: &Config) -> Result<()> {
    let path = args.storage.unwrap_or_else(|| config.storage.path.clone());
    let store = SharedStore::open(&path)
        .with_context(|| format!("failed to open store {}", path.display()))?;
    let records = store.snapshot()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        eprintln!("Store {} is empty.", path.display());
        return Ok(());
    }

    eprintln!("\n{}", records_table(&records));
    eprintln!("{} records pending in {}", records.len(), path.display());
    Ok(())
}

fn records_table(records: &[Record]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(COLUMNS.iter().map(|c| Cell::new(c).fg(Color::Cyan)));

    for record in records {
        table.add_row(COLUMNS.iter().map(|key| match record.get(key) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(v) => v.to_string(),
            None => "-".to_string(),
        }));
    }
    table
}
