//! Similarity scoring of search variants against their source track.
//!
//! This module contains:
//! - The Ratcliff/Obershelp sequence ratio used for every field comparison
//! - Field weights for tracks with and without album metadata
//! - The variant scorer that re-normalizes both sides before comparing

use crate::models::{SearchResult, SearchVariant};
use crate::normalize::{NormalizeOptions, Normalizer};

// ============================================================================
// Weights
// ============================================================================

/// Per-field weights; they sum to 1.0 so the weighted score stays in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub title: f64,
    pub artist: f64,
    pub album: f64,
}

/// Source track declares an album.
pub const WEIGHTS_WITH_ALBUM: ScoreWeights = ScoreWeights {
    title: 0.4,
    artist: 0.4,
    album: 0.2,
};

/// Album unknown: the album term is dropped rather than scored as zero.
pub const WEIGHTS_WITHOUT_ALBUM: ScoreWeights = ScoreWeights {
    title: 0.5,
    artist: 0.5,
    album: 0.0,
};

// ============================================================================
// Sequence Ratio
// ============================================================================

/// Longest common contiguous run of `a[alo..ahi]` and `b[blo..bhi]`,
/// returned as (start in a, start in b, length). Earliest match wins ties.
fn longest_match(a: &[char], b: &[char], alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_len) = (alo, blo, 0);
    // prev[j + 1] = length of the common suffix ending at a[i - 1], b[j]
    let width = bhi - blo + 1;
    let mut prev = vec![0usize; width];
    let mut curr = vec![0usize; width];
    for i in alo..ahi {
        for j in blo..bhi {
            let k = j - blo + 1;
            curr[k] = if a[i] == b[j] { prev[k - 1] + 1 } else { 0 };
            if curr[k] > best_len {
                best_len = curr[k];
                best_i = i + 1 - best_len;
                best_j = j + 1 - best_len;
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    (best_i, best_j, best_len)
}

/// Total size of the matching blocks (recursive longest-common-substring).
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut stack = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = stack.pop() {
        if alo >= ahi || blo >= bhi {
            continue;
        }
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        total += k;
        stack.push((alo, i, blo, j));
        stack.push((i + k, ahi, j + k, bhi));
    }
    total
}

/// Ratcliff/Obershelp similarity: `2 * M / T` where `M` is the number of
/// characters in matching blocks and `T` the combined length. Two empty
/// strings are identical (1.0).
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

// ============================================================================
// Variant Scoring
// ============================================================================

/// Scores variants with a shared normalizer.
pub struct Scorer<'a> {
    normalizer: &'a Normalizer,
}

impl<'a> Scorer<'a> {
    pub fn new(normalizer: &'a Normalizer) -> Self {
        Self { normalizer }
    }

    /// Similarity in [0, 1]. Both sides are re-normalized (artists with
    /// romanization) so cached query fields and raw destination metadata
    /// compare on equal terms.
    pub fn score(&self, variant: &SearchVariant) -> f64 {
        let n = self.normalizer;
        let query_title = n.plain(&variant.query_title);
        let dest_title = n.plain(&variant.destination_title);
        let query_artist = n.normalize(&variant.query_artist, NormalizeOptions::TRANSLITERATE);
        let dest_artist = n.normalize(&variant.destination_artist, NormalizeOptions::TRANSLITERATE);

        let album = if variant.source_album_known() {
            Some((n.plain(&variant.query_album), n.plain(&variant.destination_album)))
        } else {
            None
        };

        let exact = query_title == dest_title
            && query_artist == dest_artist
            && album.as_ref().map_or(true, |(q, d)| q == d);
        if exact {
            return 1.0;
        }

        let title_score = sequence_ratio(&query_title, &dest_title);
        let artist_score = sequence_ratio(&query_artist, &dest_artist);
        let score = match album {
            Some((q, d)) => {
                let w = WEIGHTS_WITH_ALBUM;
                w.title * title_score + w.artist * artist_score + w.album * sequence_ratio(&q, &d)
            }
            None => {
                let w = WEIGHTS_WITHOUT_ALBUM;
                w.title * title_score + w.artist * artist_score
            }
        };
        score.clamp(0.0, 1.0)
    }

    /// Fill `similarity_score` on every variant of every result.
    pub fn score_all(&self, results: &mut [SearchResult]) {
        for result in results.iter_mut() {
            for variant in result.variants.iter_mut() {
                variant.similarity_score = Some(self.score(variant));
            }
        }
    }
}
