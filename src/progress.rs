//! Progress bar and logging utilities.
//!
//! Provides helpers for creating progress bars and spinners, with support
//! for log-only mode where progress bars are hidden for tail-friendly output,
//! and the subscriber setup shared by the binaries.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::filter::{filter_fn, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::orchestrator::ADD_LOG_TARGET;

/// Install the global subscriber: console output filtered by `LOG_LEVEL`
/// (default `info`) and, when `log_file` is given, every add outcome
/// appended to that file regardless of the console level.
pub fn init_logging(log_file: Option<&Path>) -> io::Result<()> {
    let console = fmt::layer().with_writer(io::stderr).with_filter(
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .with_env_var("LOG_LEVEL")
            .from_env_lossy(),
    );

    let outcomes = match log_file {
        Some(path) => Some(outcome_layer(
            OpenOptions::new().create(true).append(true).open(path)?,
        )),
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(outcomes)
        .try_init()
        .map_err(io::Error::other)
}

/// Plain-text layer that only records events logged under the add-outcome
/// target.
fn outcome_layer<S>(file: File) -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_filter(filter_fn(|meta| meta.target() == ADD_LOG_TARGET))
}

/// Global flag for log-only mode (set from args in main)
pub static LOG_ONLY: AtomicBool = AtomicBool::new(false);

/// Set log-only mode globally
pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

/// Check if log-only mode is enabled
pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// Format duration in human-readable format
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        format!("{:.1}m", secs / 60.0)
    } else {
        format!("{:.1}h", secs / 3600.0)
    }
}

/// Progress bar over the tracks of one stage. Hidden in log-only mode
/// (and whenever stderr is not a terminal, which indicatif handles itself).
pub fn create_progress_bar(len: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else if let Ok(style) = ProgressStyle::default_bar()
        .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} (ETA: {eta})")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_message(msg.to_string());
    pb
}

/// Log progress periodically for tail-friendly output.
/// Only logs when in log-only mode and at specified intervals.
pub fn log_progress(phase: &str, current: u64, total: u64, interval: u64) {
    if total == 0 || interval == 0 {
        return;
    }
    if is_log_only() && (current % interval == 0 || current == total) {
        let pct = 100.0 * current as f64 / total as f64;
        tracing::info!("[{}] {}/{} ({:.1}%)", phase, current, total, pct);
    }
}

/// Spinner for the paginated library fetches, whose length is unknown.
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        if let Ok(style) = ProgressStyle::default_spinner().template("{msg} {spinner} [{elapsed_precise}]") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb.set_message(msg.to_string());
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
        assert_eq!(format_duration(Duration::from_secs(5400)), "1.5h");
    }

    #[test]
    fn test_outcome_layer_keeps_only_add_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("migration.log");
        std::fs::write(&path, "earlier run\n").unwrap();

        let file = OpenOptions::new().append(true).open(&path).unwrap();
        let subscriber = tracing_subscriber::registry().with(outcome_layer(file));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: ADD_LOG_TARGET, "Added: Song A by Artist X - Successfully added");
            tracing::error!(target: ADD_LOG_TARGET, "Failed to add: Song B by Artist Y - boom");
            tracing::info!("Searched 2 tracks");
            tracing::debug!(target: ADD_LOG_TARGET, "below the default level but still an outcome");
        });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "earlier run");
        assert!(lines[1].contains("Added: Song A by Artist X"));
        assert!(lines[2].contains("ERROR"));
        assert!(lines[2].contains("Failed to add: Song B"));
        assert!(lines[3].contains("still an outcome"));
        assert!(!content.contains("Searched 2 tracks"));
        assert!(!content.contains(ADD_LOG_TARGET));
    }

    #[test]
    fn test_log_progress_ignores_empty_totals() {
        // Must not divide by zero
        log_progress("search", 0, 0, 10);
        log_progress("search", 1, 1, 0);
    }
}
