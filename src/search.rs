//! Candidate search against the destination catalog.
//!
//! Each source track is normalized, fanned out into field-scoped queries,
//! and every track the destination returns becomes a [`SearchVariant`]
//! tagged with the normalized query fields it was found with.

use std::thread;

use crate::error::ProviderError;
use crate::featured::extract_featured_artists;
use crate::models::{NormalizedTrack, RunStats, SearchResult, SearchVariant, Track, UNKNOWN_ALBUM};
use crate::normalize::{NormalizeOptions, Normalizer};
use crate::orchestrator::Pacing;
use crate::progress::{create_progress_bar, log_progress};
use crate::providers::DestinationLibrary;
use crate::query::queries_for;

/// Results requested per query (the destination's page maximum).
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Normalize a source track for query building. Titles are normalized
/// plainly; artist names (main and featured) use `artist_options`.
pub fn normalize_track(normalizer: &Normalizer, track: &Track, artist_options: NormalizeOptions) -> NormalizedTrack {
    let (main_title, featured) = extract_featured_artists(&track.title);
    let normalized_album = if track.has_known_album() {
        Some(normalizer.plain(&track.album)).filter(|a| !a.is_empty())
    } else {
        None
    };
    NormalizedTrack {
        normalized_title: normalizer.plain(&main_title),
        normalized_artist: normalizer.normalize(&track.artist, artist_options),
        normalized_album,
        featured_artists: featured
            .iter()
            .map(|name| normalizer.normalize(name, artist_options))
            .filter(|name| !name.is_empty())
            .collect(),
    }
}

fn variant(track: &Track, normalized: &NormalizedTrack, found: Track) -> SearchVariant {
    SearchVariant {
        original_title: track.title.clone(),
        original_artist: track.artist.clone(),
        original_album: track.album.clone(),
        query_title: normalized.normalized_title.clone(),
        query_artist: normalized.normalized_artist.clone(),
        query_album: normalized
            .normalized_album
            .clone()
            .unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
        destination_title: found.title,
        destination_artist: found.artist,
        destination_album: found.album,
        destination_id: found.external_id,
        similarity_score: None,
    }
}

pub struct CandidateSearch<'a, D: DestinationLibrary + ?Sized> {
    destination: &'a D,
    normalizer: &'a Normalizer,
    artist_options: NormalizeOptions,
    limit: usize,
    pacing: Pacing,
}

impl<'a, D: DestinationLibrary + ?Sized> CandidateSearch<'a, D> {
    pub fn new(destination: &'a D, normalizer: &'a Normalizer) -> Self {
        Self {
            destination,
            normalizer,
            artist_options: NormalizeOptions::FULL,
            limit: DEFAULT_SEARCH_LIMIT,
            pacing: Pacing::default(),
        }
    }

    pub fn artist_options(mut self, options: NormalizeOptions) -> Self {
        self.artist_options = options;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// One query, retried after a cooldown while rate limited and retries
    /// remain.
    fn query(&self, query: &str) -> Result<Vec<Track>, ProviderError> {
        let mut retries_left = self.pacing.rate_limit_retries;
        loop {
            match self.destination.search_tracks(query, self.limit) {
                Err(e) if e.is_rate_limit() && retries_left > 0 => {
                    let cooldown = self.pacing.cooldown_for(&e);
                    tracing::warn!(
                        "Search rate limited, pausing for {} seconds...",
                        cooldown.as_secs()
                    );
                    if !cooldown.is_zero() {
                        thread::sleep(cooldown);
                    }
                    retries_left -= 1;
                }
                other => return other,
            }
        }
    }

    /// All candidates for one track, or `None` when no query returned
    /// anything.
    pub fn search_track(&self, track: &Track, stats: &mut RunStats) -> Option<SearchResult> {
        let normalized = normalize_track(self.normalizer, track, self.artist_options);
        let mut variants = Vec::new();

        for query in queries_for(&normalized) {
            stats.queries_issued += 1;
            match self.query(&query) {
                Ok(found) => {
                    tracing::debug!("'{}' returned {} tracks", query, found.len());
                    variants.extend(found.into_iter().map(|t| variant(track, &normalized, t)));
                }
                Err(e) => {
                    stats.query_failures += 1;
                    tracing::warn!("Search failed for query '{}': {}", query, e);
                }
            }
        }

        if variants.is_empty() {
            stats.no_candidates += 1;
            tracing::info!("No candidates for {} by {}", track.title, track.artist);
            return None;
        }
        stats.variants += variants.len();
        Some(SearchResult {
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            variants,
        })
    }

    /// Search every track in order; tracks without candidates are dropped.
    pub fn search_all(&self, tracks: &[Track], stats: &mut RunStats) -> Vec<SearchResult> {
        let total = tracks.len() as u64;
        let pb = create_progress_bar(total, "Searching destination");
        let mut results = Vec::with_capacity(tracks.len());

        for (i, track) in tracks.iter().enumerate() {
            stats.searched += 1;
            if let Some(result) = self.search_track(track, stats) {
                results.push(result);
            }
            pb.inc(1);
            log_progress("search", i as u64 + 1, total, 25);
        }

        pb.finish_and_clear();
        tracing::info!(
            "Searched {} tracks: {} with candidates, {} variants",
            tracks.len(),
            results.len(),
            stats.variants
        );
        results
    }
}
