//! Core data models for library reconciliation.
//!
//! This module contains the record structs that flow through the pipeline
//! and the persisted artifact schemas (snapshots, search dump, match dump,
//! ledger).

use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Sentinel used instead of a null album so equality checks stay simple.
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

fn unknown_album() -> String {
    UNKNOWN_ALBUM.to_string()
}

/// Accepts a missing, null or blank album and maps it to the sentinel.
fn album_or_unknown<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let album: Option<String> = Option::deserialize(deserializer)?;
    Ok(match album {
        Some(a) if !a.trim().is_empty() => a,
        _ => unknown_album(),
    })
}

/// Treats `""` the same as a missing id (older dumps wrote empty strings).
fn non_empty_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let id: Option<String> = Option::deserialize(deserializer)?;
    Ok(id.filter(|s| !s.trim().is_empty()))
}

// ============================================================================
// Library Models
// ============================================================================

/// A liked track on either service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    pub artist: String,
    #[serde(default = "unknown_album", deserialize_with = "album_or_unknown")]
    pub album: String,
    /// Destination-side track id; source tracks carry none.
    #[serde(
        default,
        alias = "spotify_id",
        alias = "id",
        deserialize_with = "non_empty_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub external_id: Option<String>,
}

impl Track {
    pub fn new(title: impl Into<String>, artist: impl Into<String>, album: Option<&str>) -> Self {
        let album = album
            .filter(|a| !a.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(unknown_album);
        Self {
            title: title.into(),
            artist: artist.into(),
            album,
            external_id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }

    pub fn has_known_album(&self) -> bool {
        self.album != UNKNOWN_ALBUM
    }
}

/// Normalized view of a source track used to build search queries.
/// Never persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedTrack {
    pub normalized_title: String,
    pub normalized_artist: String,
    pub normalized_album: Option<String>,
    pub featured_artists: Vec<String>,
}

// ============================================================================
// Search Models
// ============================================================================

/// One destination-side search result considered for a source track.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchVariant {
    pub original_title: String,
    pub original_artist: String,
    pub original_album: String,
    pub query_title: String,
    pub query_artist: String,
    pub query_album: String,
    #[serde(default, alias = "spotify_title")]
    pub destination_title: String,
    #[serde(default, alias = "spotify_artist")]
    pub destination_artist: String,
    #[serde(default, alias = "spotify_album")]
    pub destination_album: String,
    #[serde(
        default,
        alias = "spotify_id",
        deserialize_with = "non_empty_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub destination_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
}

impl SearchVariant {
    /// Score used for ranking; unscored variants rank as 0.
    pub fn score(&self) -> f64 {
        self.similarity_score.unwrap_or(0.0)
    }

    /// Whether the originating source track declared an album.
    pub fn source_album_known(&self) -> bool {
        self.original_album != UNKNOWN_ALBUM && !self.original_album.is_empty()
    }
}

/// All candidates found for one source track (one record of the search dump).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub artist: String,
    #[serde(default = "unknown_album", deserialize_with = "album_or_unknown")]
    pub album: String,
    pub variants: Vec<SearchVariant>,
}

impl SearchResult {
    pub fn track(&self) -> Track {
        Track::new(&self.title, &self.artist, Some(&self.album))
    }
}

// ============================================================================
// Match Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Selected,
    #[serde(alias = "not selected")]
    NotSelected,
}

/// Best candidate for a source track plus its threshold classification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchDecision {
    pub original_title: String,
    pub original_artist: String,
    pub original_album: String,
    pub best_variant: SearchVariant,
    pub status: MatchStatus,
    pub reason: String,
}

// ============================================================================
// Ledger Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    Added,
    Failed,
    #[serde(alias = "not added")]
    NotAdded,
}

impl LedgerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LedgerStatus::Added => "added",
            LedgerStatus::Failed => "failed",
            LedgerStatus::NotAdded => "not_added",
        }
    }
}

/// Persisted record of one add attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub original_title: String,
    pub original_artist: String,
    #[serde(default = "unknown_album", deserialize_with = "album_or_unknown")]
    pub original_album: String,
    #[serde(default)]
    pub query_title: String,
    #[serde(default)]
    pub query_artist: String,
    #[serde(default)]
    pub query_album: String,
    #[serde(default, alias = "spotify_title")]
    pub destination_title: String,
    #[serde(default, alias = "spotify_artist")]
    pub destination_artist: String,
    #[serde(default, alias = "spotify_album")]
    pub destination_album: String,
    #[serde(default, alias = "spotify_id", deserialize_with = "non_empty_id")]
    pub destination_id: Option<String>,
    #[serde(default)]
    pub similarity_score: f64,
    pub status: LedgerStatus,
    #[serde(default)]
    pub reason: String,
}

impl LedgerEntry {
    pub fn from_decision(decision: &MatchDecision, status: LedgerStatus, reason: impl Into<String>) -> Self {
        let v = &decision.best_variant;
        Self {
            original_title: decision.original_title.clone(),
            original_artist: decision.original_artist.clone(),
            original_album: decision.original_album.clone(),
            query_title: v.query_title.clone(),
            query_artist: v.query_artist.clone(),
            query_album: v.query_album.clone(),
            destination_title: v.destination_title.clone(),
            destination_artist: v.destination_artist.clone(),
            destination_album: v.destination_album.clone(),
            destination_id: v.destination_id.clone(),
            similarity_score: v.score(),
            status,
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Per-run counters, logged at the end of every stage.
#[derive(Default, Debug, Clone, Serialize)]
pub struct RunStats {
    // Diff
    pub source_tracks: usize,
    pub destination_tracks: usize,
    pub already_liked: usize,
    pub already_in_ledger: usize,
    pub missing: usize,

    // Search
    pub searched: usize,
    pub queries_issued: usize,
    pub query_failures: usize,
    pub no_candidates: usize,
    pub variants: usize,

    // Selection
    pub selected: usize,
    pub not_selected: usize,

    // Add
    pub added: usize,
    pub failed: usize,
    pub not_added: usize,
    pub not_attempted: usize,

    pub elapsed_seconds: f64,
}

impl RunStats {
    /// Share of searched tracks that produced a selected match, in percent.
    pub fn match_rate(&self) -> f64 {
        if self.searched == 0 {
            0.0
        } else {
            100.0 * self.selected as f64 / self.searched as f64
        }
    }

    /// Log stats as pretty JSON under a phase label.
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            tracing::info!("[STATS:{}]\n{}", phase, json);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_album_sentinel() {
        let t: Track = serde_json::from_str(r#"{"title":"A","artist":"B","album":null}"#).unwrap();
        assert_eq!(t.album, UNKNOWN_ALBUM);
        assert!(!t.has_known_album());

        let t: Track = serde_json::from_str(r#"{"title":"A","artist":"B"}"#).unwrap();
        assert_eq!(t.album, UNKNOWN_ALBUM);

        assert_eq!(Track::new("A", "B", Some("  ")).album, UNKNOWN_ALBUM);
        assert!(Track::new("A", "B", Some("Album")).has_known_album());
    }

    #[test]
    fn test_track_reads_legacy_spotify_id() {
        let t: Track =
            serde_json::from_str(r#"{"title":"A","artist":"B","album":"C","spotify_id":"xyz"}"#)
                .unwrap();
        assert_eq!(t.external_id.as_deref(), Some("xyz"));
    }

    #[test]
    fn test_ledger_entry_reads_legacy_schema() {
        let json = r#"{
            "original_title": "Song",
            "original_artist": "Artist",
            "original_album": "Unknown Album",
            "query_title": "song",
            "query_artist": "artist",
            "query_album": "Unknown Album",
            "spotify_title": "Song",
            "spotify_artist": "Artist",
            "spotify_album": "Album",
            "spotify_id": "abc",
            "similarity_score": 0.93,
            "status": "not added",
            "reason": "Track already added"
        }"#;
        let entry: LedgerEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.status, LedgerStatus::NotAdded);
        assert_eq!(entry.destination_id.as_deref(), Some("abc"));
        assert_eq!(entry.destination_album, "Album");

        let written = serde_json::to_string(&entry).unwrap();
        assert!(written.contains("\"status\":\"not_added\""));
        assert!(written.contains("\"destination_id\":\"abc\""));
    }

    #[test]
    fn test_match_status_legacy_spelling() {
        let s: MatchStatus = serde_json::from_str("\"not selected\"").unwrap();
        assert_eq!(s, MatchStatus::NotSelected);
    }

    #[test]
    fn test_empty_destination_id_is_missing() {
        let v: SearchVariant = serde_json::from_str(
            r#"{"original_title":"a","original_artist":"b","original_album":"c",
                "query_title":"a","query_artist":"b","query_album":"c","spotify_id":""}"#,
        )
        .unwrap();
        assert_eq!(v.destination_id, None);
        assert_eq!(v.score(), 0.0);
    }

    #[test]
    fn test_match_rate() {
        let stats = RunStats {
            searched: 4,
            selected: 3,
            ..Default::default()
        };
        assert!((stats.match_rate() - 75.0).abs() < 1e-9);
        assert_eq!(RunStats::default().match_rate(), 0.0);
    }
}
