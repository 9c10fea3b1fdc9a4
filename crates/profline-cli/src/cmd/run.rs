//! `profline run` - one generate → process → send session

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use profline_core::{SessionSummary, SharedProgress, StallPolicy};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// How many records to generate
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub count: u64,

    /// Store file (reset at session start)
    #[arg(short, long)]
    pub storage: Option<PathBuf>,

    /// Address of the server receiving batches
    #[arg(short, long)]
    pub address: Option<String>,

    /// Seed for reproducible record generation
    #[arg(long)]
    pub seed: Option<u64>,

    /// Milliseconds between generated records
    #[arg(long)]
    pub generation_interval_ms: Option<u64>,

    /// Milliseconds the processor waits for a record before reporting a stall
    #[arg(long)]
    pub poll_timeout_ms: Option<u64>,

    /// Milliseconds between sender drains
    #[arg(long)]
    pub batch_interval_ms: Option<u64>,

    /// Processor behavior on stall: wait | abort
    #[arg(long)]
    pub stall_policy: Option<StallPolicy>,
}

pub fn run(args: RunArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let mut session = config.session(args.count as usize);
    if let Some(path) = args.storage {
        session.storage_location = path;
    }
    if let Some(address) = args.address {
        session.sink_address = address;
    }
    if args.seed.is_some() {
        session.seed = args.seed;
    }
    if let Some(ms) = args.generation_interval_ms {
        session.generation_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = args.poll_timeout_ms {
        session.processing_poll_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = args.batch_interval_ms {
        session.batch_interval = Duration::from_millis(ms);
    }
    if let Some(policy) = args.stall_policy {
        session.stall_policy = policy;
    }

    let summary = profline_core::run(&session, progress).with_context(|| {
        format!(
            "session failed (store {})",
            session.storage_location.display()
        )
    })?;

    progress.println(format!("\n{}", summary_table(&summary)));

    if let Some(e) = &summary.generator.error {
        anyhow::bail!("generation stopped early: {e}");
    }
    if !summary.is_clean() {
        log::warn!("session finished with losses, see summary");
    }
    Ok(())
}

fn summary_table(summary: &SessionSummary) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Stage").fg(Color::Cyan),
            Cell::new("Result").fg(Color::Cyan),
        ]);

    let g = &summary.generator;
    let p = &summary.processor;
    let s = &summary.sender;
    table.add_row(vec!["Generated".to_string(), g.emitted.to_string()]);
    table.add_row(vec![
        "Processed".to_string(),
        format!("{} kept, {} dropped", p.kept, p.dropped),
    ]);
    if p.stalls > 0 {
        let note = if p.aborted { " (aborted)" } else { "" };
        table.add_row(vec!["Stalls".to_string(), format!("{}{note}", p.stalls)]);
    }
    table.add_row(vec![
        "Sent".to_string(),
        format!("{} records in {} batches", s.records_sent, s.batches_sent),
    ]);
    if s.batches_failed > 0 || p.store_errors > 0 || s.store_errors > 0 {
        table.add_row(vec![
            "Lost".to_string(),
            format!(
                "{} records ({} failed batches, {} store errors)",
                s.records_lost + p.store_errors,
                s.batches_failed,
                p.store_errors + s.store_errors
            ),
        ]);
    }
    table.add_row(vec![
        "Store".to_string(),
        if summary.store_empty { "empty" } else { "not empty" }.to_string(),
    ]);
    table.add_row(vec![
        "Time".to_string(),
        format!("{:.1}s", summary.elapsed.as_secs_f64()),
    ]);
    table
}
