//! Runtime configuration.
//!
//! Three layers, highest precedence first: command-line flags, the optional
//! TOML file, built-in defaults. The binaries collect flags into
//! [`CliOverrides`], load a [`FileConfig`], and resolve both into an
//! [`AppConfig`] that the rest of the crate reads.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{SyncError, SyncResult};
use crate::normalize::NormalizeOptions;
use crate::orchestrator::Pacing;
use crate::pipeline::PipelineSettings;
use crate::safety::validate_artifact_set;
use crate::search::DEFAULT_SEARCH_LIMIT;
use crate::selector::DEFAULT_THRESHOLD;

pub const TOKEN_ENV_VAR: &str = "SPOTIFY_TOKEN";

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_LOG_FILE: &str = "migration.log";
pub const DEFAULT_HEADERS_FILE: &str = "headers_auth.json";
pub const DEFAULT_MAX_TRACKS: usize = 10_000;

// ============================================================================
// File layer
// ============================================================================

/// Artifact file names, relative to the data directory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileNames {
    pub source_likes: Option<String>,
    pub destination_likes: Option<String>,
    pub search_results: Option<String>,
    pub match_results: Option<String>,
    pub ledger: Option<String>,
}

/// Contents of the TOML config file. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub data_dir: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub files: FileNames,

    pub threshold: Option<f64>,
    pub search_limit: Option<usize>,
    pub max_tracks: Option<usize>,

    pub add_delay_secs: Option<f64>,
    pub rate_limit_cooldown_secs: Option<f64>,
    pub rate_limit_retries: Option<u32>,

    pub transliterate_artists: Option<bool>,
    pub translate_artists: Option<bool>,
    pub translate_endpoint: Option<String>,

    pub spotify_token_file: Option<PathBuf>,
    pub ytmusic_headers_file: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> SyncResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| SyncError::Persistence {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

// ============================================================================
// CLI layer
// ============================================================================

/// Values given on the command line; `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub data_dir: Option<PathBuf>,
    pub threshold: Option<f64>,
    pub max_tracks: Option<usize>,
    pub dry_run: bool,
    pub refresh: bool,
}

// ============================================================================
// Resolved configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub source_likes: PathBuf,
    pub destination_likes: PathBuf,
    pub search_results: PathBuf,
    pub match_results: PathBuf,
    pub ledger: PathBuf,
}

impl ArtifactPaths {
    /// Default file names under `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::resolve(data_dir, &FileNames::default())
    }

    fn resolve(data_dir: &Path, names: &FileNames) -> Self {
        let pick = |name: &Option<String>, default: &str| data_dir.join(name.as_deref().unwrap_or(default));
        Self {
            source_likes: pick(&names.source_likes, "youtube_likes.json"),
            destination_likes: pick(&names.destination_likes, "spotify_likes.json"),
            search_results: pick(&names.search_results, "search_results.json"),
            match_results: pick(&names.match_results, "match_results.json"),
            ledger: pick(&names.ledger, "added_songs_to_spotify.json"),
        }
    }

    pub fn validate(&self) -> SyncResult<()> {
        validate_artifact_set(&[
            &self.source_likes,
            &self.destination_likes,
            &self.search_results,
            &self.match_results,
            &self.ledger,
        ])
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub log_file: PathBuf,
    pub artifacts: ArtifactPaths,

    pub threshold: f64,
    pub search_limit: usize,
    pub max_tracks: usize,
    pub pacing: Pacing,

    pub transliterate_artists: bool,
    pub translate_artists: bool,
    pub translate_endpoint: Option<String>,

    pub spotify_token_file: Option<PathBuf>,
    pub ytmusic_headers_file: PathBuf,

    pub dry_run: bool,
    pub refresh: bool,
}

fn seconds(value: Option<f64>, default: u64, name: &str) -> SyncResult<Duration> {
    match value {
        None => Ok(Duration::from_secs(default)),
        Some(v) => Duration::try_from_secs_f64(v)
            .map_err(|_| SyncError::Config(format!("{} must be a non-negative number of seconds, got {}", name, v))),
    }
}

impl AppConfig {
    pub fn resolve(cli: CliOverrides, file: FileConfig) -> SyncResult<Self> {
        let data_dir = cli
            .data_dir
            .or(file.data_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let threshold = cli.threshold.or(file.threshold).unwrap_or(DEFAULT_THRESHOLD);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(SyncError::Config(format!("threshold must be within [0, 1], got {}", threshold)));
        }

        let search_limit = file.search_limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        if !(1..=DEFAULT_SEARCH_LIMIT).contains(&search_limit) {
            return Err(SyncError::Config(format!(
                "search_limit must be between 1 and {}, got {}",
                DEFAULT_SEARCH_LIMIT, search_limit
            )));
        }

        let defaults = Pacing::default();
        let pacing = Pacing {
            add_delay: seconds(file.add_delay_secs, defaults.add_delay.as_secs(), "add_delay_secs")?,
            rate_limit_cooldown: seconds(
                file.rate_limit_cooldown_secs,
                defaults.rate_limit_cooldown.as_secs(),
                "rate_limit_cooldown_secs",
            )?,
            rate_limit_retries: file.rate_limit_retries.unwrap_or(defaults.rate_limit_retries),
        };

        let artifacts = ArtifactPaths::resolve(&data_dir, &file.files);
        artifacts.validate()?;

        Ok(Self {
            log_file: file.log_file.unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            artifacts,
            data_dir,
            threshold,
            search_limit,
            max_tracks: cli.max_tracks.or(file.max_tracks).unwrap_or(DEFAULT_MAX_TRACKS),
            pacing,
            transliterate_artists: file.transliterate_artists.unwrap_or(true),
            translate_artists: file.translate_artists.unwrap_or(true),
            translate_endpoint: file.translate_endpoint,
            spotify_token_file: file.spotify_token_file,
            ytmusic_headers_file: file
                .ytmusic_headers_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HEADERS_FILE)),
            dry_run: cli.dry_run,
            refresh: cli.refresh,
        })
    }

    /// Normalization applied to artist names before querying. Translation
    /// implies transliteration.
    pub fn artist_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            transliterate: self.transliterate_artists || self.translate_artists,
            translate: self.translate_artists,
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            threshold: self.threshold,
            search_limit: self.search_limit,
            max_tracks: self.max_tracks,
            artist_options: self.artist_options(),
            pacing: self.pacing,
            dry_run: self.dry_run,
            refresh: self.refresh,
        }
    }

    /// Bearer token for the destination API: the `SPOTIFY_TOKEN` environment
    /// variable, else the configured token file.
    pub fn spotify_token(&self) -> SyncResult<String> {
        if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
            if !token.trim().is_empty() {
                return Ok(token.trim().to_string());
            }
        }
        let path = self.spotify_token_file.as_deref().ok_or_else(|| {
            SyncError::Config(format!(
                "no Spotify token: set {} or spotify_token_file in the config",
                TOKEN_ENV_VAR
            ))
        })?;
        let content = fs::read_to_string(path).map_err(|source| SyncError::Persistence {
            path: path.to_path_buf(),
            source,
        })?;
        parse_token(&content)
            .ok_or_else(|| SyncError::Config(format!("{} holds no access token", path.display())))
    }
}

/// A token file is either a JSON token cache with `access_token` or the raw
/// token text.
fn parse_token(content: &str) -> Option<String> {
    let content = content.trim();
    if content.starts_with('{') {
        let value: serde_json::Value = serde_json::from_str(content).ok()?;
        return value
            .get("access_token")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .filter(|t| !t.is_empty());
    }
    Some(content.to_string()).filter(|t| !t.is_empty())
}
