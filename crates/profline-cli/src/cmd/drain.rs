//! `profline drain` - send what an earlier session left in the store

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use profline_core::{ImaginaryServer, Sender, SenderConfig, SenderStats, SharedProgress, SharedStore};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct DrainArgs {
    /// Store file (default: from config)
    #[arg(short, long)]
    pub storage: Option<PathBuf>,

    /// Address of the server receiving batches
    #[arg(short, long)]
    pub address: Option<String>,

    /// Milliseconds between drains
    #[arg(long)]
    pub batch_interval_ms: Option<u64>,

    /// Stop after this many consecutive empty drains
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_empty_drains: Option<u32>,
}

pub fn run(args: DrainArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let path = args.storage.unwrap_or_else(|| config.storage.path.clone());
    let store = SharedStore::open(&path)
        .with_context(|| format!("failed to open store {}", path.display()))?;

    let address = args
        .address
        .or_else(|| config.sink.address.clone())
        .unwrap_or_default();
    let sink = ImaginaryServer::new(address, Duration::from_millis(config.sink.latency_ms));
    let interval = args
        .batch_interval_ms
        .unwrap_or(config.timing.batch_interval_ms);
    let max_empty = args
        .max_empty_drains
        .unwrap_or(config.sender.max_empty_drains);

    log::info!(
        "draining {} ({} pending), stopping after {max_empty} empty drains",
        path.display(),
        store.len()?
    );
    let line = progress.stage_line("send");
    let sender_config = SenderConfig {
        batch_interval: Duration::from_millis(interval),
    };
    let stats = Sender::new(&store, sink, sender_config).run_until_idle(max_empty, &line);

    progress.println(report(&stats));
    if stats.batches_failed > 0 || stats.store_errors > 0 {
        anyhow::bail!(
            "{} records lost in {} failed batches, {} store errors",
            stats.records_lost,
            stats.batches_failed,
            stats.store_errors
        );
    }
    Ok(())
}

fn report(stats: &SenderStats) -> String {
    format!(
        "Sent {} records in {} batches ({} drains)",
        stats.records_sent, stats.batches_sent, stats.drains
    )
}
