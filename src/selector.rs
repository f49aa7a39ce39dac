//! Best-match selection with a confidence threshold.

use crate::models::{MatchDecision, MatchStatus, SearchResult, SearchVariant, Track};

/// Default confidence threshold. A variant must score strictly above it to
/// be added without review.
pub const DEFAULT_THRESHOLD: f64 = 0.8;

pub const REASON_SELECTED: &str = "High similarity score";
pub const REASON_NOT_SELECTED: &str = "No match above threshold";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchSelector {
    threshold: f64,
}

impl Default for MatchSelector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl MatchSelector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Pick the highest-scoring variant; ties keep the earliest one.
    pub fn select(&self, track: &Track, variants: &[SearchVariant]) -> MatchDecision {
        let mut best: Option<&SearchVariant> = None;
        for variant in variants {
            match best {
                Some(current) if variant.score() <= current.score() => {}
                _ => best = Some(variant),
            }
        }

        let best_variant = best.cloned().unwrap_or_else(|| SearchVariant {
            original_title: track.title.clone(),
            original_artist: track.artist.clone(),
            original_album: track.album.clone(),
            similarity_score: Some(0.0),
            ..Default::default()
        });

        let (status, reason) = if best_variant.score() > self.threshold {
            (MatchStatus::Selected, REASON_SELECTED)
        } else {
            (MatchStatus::NotSelected, REASON_NOT_SELECTED)
        };

        MatchDecision {
            original_title: track.title.clone(),
            original_artist: track.artist.clone(),
            original_album: track.album.clone(),
            best_variant,
            status,
            reason: reason.to_string(),
        }
    }

    /// One decision per search result, in input order.
    pub fn select_all(&self, results: &[SearchResult]) -> Vec<MatchDecision> {
        results
            .iter()
            .map(|r| self.select(&r.track(), &r.variants))
            .collect()
    }
}
