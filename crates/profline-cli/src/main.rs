//! profline - generate, validate, and send synthetic profile records
//!
//! Runs a three-stage pipeline (generator, processor, sender) for one
//! bounded session and reports what reached the downstream server.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "profline")]
#[command(about = "Generate, validate, and send synthetic profile records")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./profline.toml or ~/.config/profline/config.toml)
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one pipeline session
    Run(cmd::run::RunArgs),
    /// Show records waiting in the store
    Inspect(cmd::inspect::InspectArgs),
    /// Send records left in a store until it stays empty
    Drain(cmd::drain::DrainArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(profline_core::ProgressContext::new());

    // Logging:
    //   TTY:     warn unless --debug, stage lines show activity
    //   non-TTY: info unless --debug
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    profline_core::init_logging(quiet, cli.debug, multi);

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Run(args) => cmd::run::run(args, &config, &progress),
        Command::Inspect(args) => cmd::inspect::run(args, &config),
        Command::Drain(args) => cmd::drain::run(args, &config, &progress),
        Command::Config => {
            use comfy_table::{
                Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
            };

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            table.add_row(vec![
                "Store",
                &config.storage.path.display().to_string(),
            ]);
            table.add_row(vec![
                "Sink address",
                config.sink.address.as_deref().unwrap_or("not set"),
            ]);
            table.add_row(vec![
                "Sink latency",
                &format!("{}ms", config.sink.latency_ms),
            ]);
            table.add_row(vec![
                "Generation interval",
                &format!("{}ms", config.timing.generation_interval_ms),
            ]);
            table.add_row(vec![
                "Poll timeout",
                &format!("{}ms", config.timing.poll_timeout_ms),
            ]);
            table.add_row(vec!["Pace", &format!("{}ms", config.timing.pace_ms)]);
            table.add_row(vec![
                "Batch interval",
                &format!("{}ms", config.timing.batch_interval_ms),
            ]);
            table.add_row(vec![
                "Stall policy",
                &config.processor.stall_policy.to_string(),
            ]);
            table.add_row(vec![
                "Max empty drains",
                &config.sender.max_empty_drains.to_string(),
            ]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}
