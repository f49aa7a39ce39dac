use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;

use likes_sync::config::{AppConfig, CliOverrides, FileConfig};
use likes_sync::models::RunStats;
use likes_sync::normalize::Normalizer;
use likes_sync::pipeline::Pipeline;
use likes_sync::progress::{init_logging, set_log_only};
use likes_sync::providers::{SpotifyClient, YtMusicClient};
use likes_sync::translate::GoogleTranslator;

#[derive(Parser)]
#[command(name = "likes-sync")]
#[command(about = "Copy YouTube Music likes into the Spotify library")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the JSON artifacts
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Minimum similarity (exclusive) for a match to be added
    #[arg(long, global = true)]
    threshold: Option<f64>,

    /// Log what would be added without touching the library or the ledger
    #[arg(long, global = true)]
    dry_run: bool,

    /// Re-fetch likes instead of reusing the cached snapshots
    #[arg(long, global = true)]
    refresh: bool,

    /// Disable progress bars, use periodic log lines instead (for background runs)
    #[arg(long, global = true)]
    log_only: bool,

    /// Maximum number of missing tracks to search this run
    #[arg(long, global = true)]
    limit: Option<usize>,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Diff, search, score, select and add (default)
    Sync,
    /// Stop after writing the match results
    Search,
    /// Add selected tracks from existing match results
    Add,
    /// Re-score the saved search results without querying again
    Rescore,
}

impl Command {
    fn needs_source(self) -> bool {
        matches!(self, Command::Sync | Command::Search)
    }

    fn needs_destination(self) -> bool {
        self != Command::Rescore
    }
}

fn print_summary(stats: &RunStats) {
    println!("\n{:=<60}", "");
    println!("Run complete!");
    println!("  Source likes:       {}", stats.source_tracks);
    println!("  Missing:            {}", stats.missing);
    println!("  Searched:           {}", stats.searched);
    println!("  Selected:           {} ({:.1}%)", stats.selected, stats.match_rate());
    println!("  Below threshold:    {}", stats.not_selected);
    println!("  Added:              {}", stats.added);
    println!("  Failed:             {}", stats.failed);
    println!("  Already added:      {}", stats.not_added);
    println!("  Elapsed:            {:.2}s", stats.elapsed_seconds);
    println!("{:=<60}", "");
}

fn main() -> Result<()> {
    let args = Args::parse();
    set_log_only(args.log_only);

    let file_config = match &args.config {
        Some(path) => FileConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => FileConfig::default(),
    };
    let config = AppConfig::resolve(
        CliOverrides {
            data_dir: args.data_dir,
            threshold: args.threshold,
            max_tracks: args.limit,
            dry_run: args.dry_run,
            refresh: args.refresh,
        },
        file_config,
    )
    .context("Invalid configuration")?;

    init_logging(Some(&config.log_file))
        .with_context(|| format!("Failed to open log file {}", config.log_file.display()))?;

    let command = args.command.unwrap_or(Command::Sync);

    let normalizer = if config.translate_artists {
        let translator = match &config.translate_endpoint {
            Some(endpoint) => GoogleTranslator::new(endpoint),
            None => GoogleTranslator::default(),
        };
        Normalizer::with_translator(Box::new(translator))
    } else {
        Normalizer::default()
    };

    // Offline stages get inert clients; nothing calls them.
    let source = if command.needs_source() {
        YtMusicClient::from_headers_file(&config.ytmusic_headers_file).with_context(|| {
            format!(
                "Failed to load YouTube Music headers from {}",
                config.ytmusic_headers_file.display()
            )
        })?
    } else {
        YtMusicClient::new(BTreeMap::new())
    };
    let destination = if command.needs_destination() {
        SpotifyClient::new(config.spotify_token().context("Failed to load Spotify token")?)
    } else {
        SpotifyClient::new(String::new())
    };

    tracing::info!("Data directory: {}", config.data_dir.display());
    if config.dry_run {
        tracing::info!("Dry run: nothing will be added");
    }

    let pipeline = Pipeline::new(
        &source,
        &destination,
        &normalizer,
        &config.artifacts,
        config.pipeline_settings(),
    );
    let stats = match command {
        Command::Sync => pipeline.sync(),
        Command::Search => pipeline.search(),
        Command::Add => pipeline.add(),
        Command::Rescore => pipeline.rescore(),
    }
    .context("Run aborted")?;

    print_summary(&stats);
    Ok(())
}
