//! Summarize the reconciliation ledger and optionally de-duplicate it.
//!
//! Usage: ledger-report [--config likes-sync.toml] [--data-dir data] [--dedup] [--review]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use likes_sync::config::{AppConfig, CliOverrides, FileConfig};
use likes_sync::ledger::Ledger;
use likes_sync::models::{LedgerStatus, MatchDecision, MatchStatus};
use likes_sync::progress::init_logging;
use likes_sync::snapshot::read_json;

#[derive(Parser)]
#[command(name = "ledger-report")]
#[command(about = "Report on the add ledger of likes-sync")]
struct Args {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the JSON artifacts
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Rewrite the ledger keeping only the first `added` entry per destination id
    #[arg(long)]
    dedup: bool,

    /// List tracks whose best match stayed below the threshold
    #[arg(long)]
    review: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(None).context("Failed to initialise logging")?;

    let file_config = match &args.config {
        Some(path) => FileConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => FileConfig::default(),
    };
    let config = AppConfig::resolve(
        CliOverrides {
            data_dir: args.data_dir,
            ..Default::default()
        },
        file_config,
    )
    .context("Invalid configuration")?;

    let mut ledger = Ledger::load(&config.artifacts.ledger).context("Failed to load ledger")?;
    let counts = ledger.status_counts();

    println!("\n{:=<60}", "");
    println!("Ledger: {}", ledger.path().display());
    println!("  Entries: {}", ledger.len());
    for status in [LedgerStatus::Added, LedgerStatus::NotAdded, LedgerStatus::Failed] {
        println!("  {:<10} {}", status.as_str(), counts.get(&status).copied().unwrap_or(0));
    }

    let duplicates = ledger.duplicate_added_ids();
    println!("  Destination ids added more than once: {}", duplicates.len());
    for id in duplicates.iter().take(20) {
        println!("    {}", id);
    }
    if duplicates.len() > 20 {
        println!("    ... and {} more", duplicates.len() - 20);
    }

    let failures: Vec<_> = ledger
        .entries()
        .iter()
        .filter(|e| e.status == LedgerStatus::Failed)
        .collect();
    if !failures.is_empty() {
        println!("\nFailed adds:");
        for entry in failures.iter().take(20) {
            println!("  {} - {}: {}", entry.original_artist, entry.original_title, entry.reason);
        }
    }
    println!("{:=<60}", "");

    if args.review {
        let decisions: Vec<MatchDecision> = read_json(&config.artifacts.match_results)
            .context("Failed to read match results")?
            .unwrap_or_default();
        let below: Vec<_> = decisions
            .iter()
            .filter(|d| d.status == MatchStatus::NotSelected)
            .collect();
        println!("\nBelow threshold {} ({} tracks):", config.threshold, below.len());
        for d in below {
            let v = &d.best_variant;
            println!(
                "  [{:.3}] {} - {}  =>  {} - {}",
                v.score(),
                d.original_artist,
                d.original_title,
                v.destination_artist,
                v.destination_title
            );
        }
    }

    if args.dedup {
        let removed = ledger.dedup_by_destination_id();
        if removed > 0 {
            ledger.save().context("Failed to write ledger")?;
        }
        println!("\nRemoved {} duplicate entries", removed);
    }

    Ok(())
}
