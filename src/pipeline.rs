//! Stage wiring: diff, search, score, select, add.
//!
//! Every stage reads and writes its artifact under the configured data
//! directory, so any stage can be re-run on its own (`rescore` from the
//! search dump, `add` from the match dump) and an interrupted sync resumes
//! from the ledger.

use rustc_hash::FxHashSet;
use std::fs;
use std::path::Path;
use std::time::Instant;

use crate::config::ArtifactPaths;
use crate::error::{ProviderError, SyncError, SyncResult};
use crate::ledger::{track_key, Ledger, TrackKey};
use crate::models::{MatchDecision, MatchStatus, RunStats, SearchResult, Track};
use crate::normalize::{NormalizeOptions, Normalizer};
use crate::orchestrator::{AddOrchestrator, AddReport, Pacing};
use crate::progress::{create_spinner, format_duration};
use crate::providers::{DestinationLibrary, SourceLibrary};
use crate::scoring::Scorer;
use crate::search::{CandidateSearch, DEFAULT_SEARCH_LIMIT};
use crate::selector::{MatchSelector, DEFAULT_THRESHOLD};
use crate::snapshot::{read_json, read_or_fetch, validate_tracks, write_json};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    pub threshold: f64,
    pub search_limit: usize,
    /// Cap on tracks searched per run.
    pub max_tracks: usize,
    pub artist_options: NormalizeOptions,
    pub pacing: Pacing,
    pub dry_run: bool,
    /// Re-fetch likes snapshots instead of reusing cached files.
    pub refresh: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            search_limit: DEFAULT_SEARCH_LIMIT,
            max_tracks: 10_000,
            artist_options: NormalizeOptions::FULL,
            pacing: Pacing::default(),
            dry_run: false,
            refresh: false,
        }
    }
}

// ============================================================================
// Diff
// ============================================================================

/// Source tracks that still need work: duplicates collapsed (first wins),
/// tracks already liked on the destination and tracks the ledger has seen
/// removed. Order is preserved.
pub fn missing_tracks(source: &[Track], destination: &[Track], ledger: &Ledger, stats: &mut RunStats) -> Vec<Track> {
    let liked: FxHashSet<TrackKey> = destination
        .iter()
        .map(|t| track_key(&t.title, &t.artist))
        .collect();
    let mut seen: FxHashSet<TrackKey> = FxHashSet::default();
    let mut missing = Vec::new();

    for track in source {
        let key = track_key(&track.title, &track.artist);
        if !seen.insert(key.clone()) {
            continue;
        }
        if liked.contains(&key) {
            stats.already_liked += 1;
            continue;
        }
        if ledger.excludes(track) {
            stats.already_in_ledger += 1;
            continue;
        }
        missing.push(track.clone());
    }

    stats.missing = missing.len();
    tracing::info!(
        "{} source likes, {} already liked on destination, {} already in ledger, {} missing",
        source.len(),
        stats.already_liked,
        stats.already_in_ledger,
        stats.missing
    );
    missing
}

// ============================================================================
// Pipeline
// ============================================================================

pub struct Pipeline<'a, S: SourceLibrary + ?Sized, D: DestinationLibrary + ?Sized> {
    source: &'a S,
    destination: &'a D,
    normalizer: &'a Normalizer,
    paths: &'a ArtifactPaths,
    settings: PipelineSettings,
}

impl<'a, S, D> Pipeline<'a, S, D>
where
    S: SourceLibrary + ?Sized,
    D: DestinationLibrary + ?Sized,
{
    pub fn new(
        source: &'a S,
        destination: &'a D,
        normalizer: &'a Normalizer,
        paths: &'a ArtifactPaths,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            destination,
            normalizer,
            paths,
            settings,
        }
    }

    fn likes<F>(&self, path: &Path, label: &str, fetch: F) -> SyncResult<Vec<Track>>
    where
        F: FnOnce() -> Result<Vec<Track>, ProviderError>,
    {
        if self.settings.refresh && path.exists() {
            tracing::info!("Refreshing {}", path.display());
            fs::remove_file(path).map_err(|source| SyncError::Persistence {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let spinner = create_spinner(&format!("Loading {} likes", label));
        let tracks = read_or_fetch(path, fetch);
        spinner.finish_and_clear();
        tracks
    }

    /// Diff and search; writes the search dump. Returns the ledger so the
    /// add stage reuses it.
    fn search_stage(&self, stats: &mut RunStats) -> SyncResult<(Vec<SearchResult>, Ledger)> {
        let source = self.likes(&self.paths.source_likes, "source", || self.source.liked_tracks())?;
        let destination = self.likes(&self.paths.destination_likes, "destination", || {
            self.destination.liked_tracks()
        })?;
        stats.source_tracks = source.len();
        stats.destination_tracks = destination.len();

        let ledger = Ledger::load(&self.paths.ledger)?;
        let mut missing = missing_tracks(&source, &destination, &ledger, stats);
        if missing.len() > self.settings.max_tracks {
            tracing::info!(
                "Limiting this run to the first {} of {} missing tracks",
                self.settings.max_tracks,
                missing.len()
            );
            missing.truncate(self.settings.max_tracks);
        }

        let results = CandidateSearch::new(self.destination, self.normalizer)
            .artist_options(self.settings.artist_options)
            .limit(self.settings.search_limit)
            .pacing(self.settings.pacing)
            .search_all(&missing, stats);
        write_json(&self.paths.search_results, &results)?;
        stats.log_phase("search");
        Ok((results, ledger))
    }

    /// Score and select; writes the match dump.
    fn match_stage(&self, results: &mut [SearchResult], stats: &mut RunStats) -> SyncResult<Vec<MatchDecision>> {
        Scorer::new(self.normalizer).score_all(results);
        let decisions = MatchSelector::new(self.settings.threshold).select_all(results);
        stats.selected = decisions
            .iter()
            .filter(|d| d.status == MatchStatus::Selected)
            .count();
        stats.not_selected = decisions.len() - stats.selected;
        write_json(&self.paths.match_results, &decisions)?;
        tracing::info!(
            "{} selected, {} below threshold {} ({:.1}% match rate)",
            stats.selected,
            stats.not_selected,
            self.settings.threshold,
            stats.match_rate()
        );
        Ok(decisions)
    }

    fn add_stage(&self, decisions: &[MatchDecision], ledger: &mut Ledger, stats: &mut RunStats) -> SyncResult<AddReport> {
        let report = AddOrchestrator::new(self.destination, self.settings.pacing)
            .dry_run(self.settings.dry_run)
            .run(decisions, ledger)?;
        stats.added = report.added();
        stats.failed = report.failed();
        stats.not_added = report.already_added();
        stats.not_attempted = report.not_attempted();
        Ok(report)
    }

    fn finish(&self, mut stats: RunStats, started: Instant, phase: &str) -> RunStats {
        stats.elapsed_seconds = started.elapsed().as_secs_f64();
        stats.log_phase(phase);
        tracing::info!("Finished {} in {}", phase, format_duration(started.elapsed()));
        stats
    }

    /// Full run: diff, search, score, select, add.
    pub fn sync(&self) -> SyncResult<RunStats> {
        let started = Instant::now();
        let mut stats = RunStats::default();
        let (mut results, mut ledger) = self.search_stage(&mut stats)?;
        let decisions = self.match_stage(&mut results, &mut stats)?;
        self.add_stage(&decisions, &mut ledger, &mut stats)?;
        Ok(self.finish(stats, started, "sync"))
    }

    /// Stop after the match dump is written.
    pub fn search(&self) -> SyncResult<RunStats> {
        let started = Instant::now();
        let mut stats = RunStats::default();
        let (mut results, _) = self.search_stage(&mut stats)?;
        self.match_stage(&mut results, &mut stats)?;
        Ok(self.finish(stats, started, "search"))
    }

    /// Re-score the search dump offline and rewrite the match dump.
    pub fn rescore(&self) -> SyncResult<RunStats> {
        let started = Instant::now();
        let mut stats = RunStats::default();
        let mut results: Vec<SearchResult> = read_json(&self.paths.search_results)?.ok_or_else(|| {
            SyncError::Config(format!(
                "{} not found; run a search first",
                self.paths.search_results.display()
            ))
        })?;
        let tracks: Vec<Track> = results.iter().map(SearchResult::track).collect();
        validate_tracks(&tracks, &self.paths.search_results)?;
        stats.searched = results.len();
        stats.variants = results.iter().map(|r| r.variants.len()).sum();
        self.match_stage(&mut results, &mut stats)?;
        Ok(self.finish(stats, started, "rescore"))
    }

    /// Run the add stage from an existing match dump.
    pub fn add(&self) -> SyncResult<RunStats> {
        let started = Instant::now();
        let mut stats = RunStats::default();
        let decisions: Vec<MatchDecision> = read_json(&self.paths.match_results)?.ok_or_else(|| {
            SyncError::Config(format!(
                "{} not found; run a search first",
                self.paths.match_results.display()
            ))
        })?;
        stats.selected = decisions
            .iter()
            .filter(|d| d.status == MatchStatus::Selected)
            .count();
        stats.not_selected = decisions.len() - stats.selected;
        let mut ledger = Ledger::load(&self.paths.ledger)?;
        self.add_stage(&decisions, &mut ledger, &mut stats)?;
        Ok(self.finish(stats, started, "add"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LedgerEntry, LedgerStatus};
    use std::cell::{Cell, RefCell};

    struct FakeSource(Vec<Track>);

    impl SourceLibrary for FakeSource {
        fn liked_tracks(&self) -> Result<Vec<Track>, ProviderError> {
            Ok(self.0.clone())
        }
    }

    /// In-memory destination: adding a track also likes it.
    struct FakeDestination {
        catalog: Vec<Track>,
        liked: RefCell<Vec<Track>>,
        add_calls: RefCell<Vec<Vec<String>>>,
        searches: Cell<usize>,
    }

    impl FakeDestination {
        fn new(catalog: Vec<Track>) -> Self {
            Self {
                catalog,
                liked: RefCell::new(Vec::new()),
                add_calls: RefCell::new(Vec::new()),
                searches: Cell::new(0),
            }
        }
    }

    impl DestinationLibrary for FakeDestination {
        fn liked_tracks(&self) -> Result<Vec<Track>, ProviderError> {
            Ok(self.liked.borrow().clone())
        }

        fn search_tracks(&self, _: &str, _: usize) -> Result<Vec<Track>, ProviderError> {
            self.searches.set(self.searches.get() + 1);
            Ok(self.catalog.clone())
        }

        fn add_tracks(&self, ids: &[String]) -> Result<(), ProviderError> {
            self.add_calls.borrow_mut().push(ids.to_vec());
            for id in ids {
                if let Some(t) = self.catalog.iter().find(|t| t.external_id.as_deref() == Some(id)) {
                    self.liked.borrow_mut().push(t.clone());
                }
            }
            Ok(())
        }
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            pacing: Pacing::none(),
            refresh: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_end_to_end_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let normalizer = Normalizer::default();
        let source = FakeSource(vec![Track::new("Song A", "Artist X", None)]);
        let destination = FakeDestination::new(vec![Track::new("Song A", "Artist X", Some("Some Album")).with_id("abc")]);

        let pipeline = Pipeline::new(&source, &destination, &normalizer, &paths, settings());
        let stats = pipeline.sync().unwrap();

        assert_eq!(stats.selected, 1);
        assert_eq!(stats.added, 1);
        assert_eq!(*destination.add_calls.borrow(), vec![vec!["abc".to_string()]]);

        let ledger = Ledger::load(&paths.ledger).unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.entries()[0].status, LedgerStatus::Added);
        assert_eq!(ledger.entries()[0].destination_id.as_deref(), Some("abc"));

        let matches: Vec<MatchDecision> = read_json(&paths.match_results).unwrap().unwrap();
        assert_eq!(matches[0].status, MatchStatus::Selected);

        // Second run: "abc" is now liked on the destination, so the track is
        // excluded before any search.
        let searches_before = destination.searches.get();
        let stats = pipeline.sync().unwrap();
        assert_eq!(stats.already_liked, 1);
        assert_eq!(stats.searched, 0);
        assert_eq!(destination.searches.get(), searches_before);
        assert_eq!(destination.add_calls.borrow().len(), 1);
        assert_eq!(Ledger::load(&paths.ledger).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_tracks_filters_and_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::load(&dir.path().join("ledger.json")).unwrap();
        ledger
            .append([LedgerEntry::from_decision(
                &MatchSelector::default().select(&Track::new("Failed Song", "C", None), &[]),
                LedgerStatus::Failed,
                "boom",
            )])
            .unwrap();

        let source = vec![
            Track::new("Song A", "Artist X", None),
            Track::new("song a", "ARTIST X", Some("Album")),
            Track::new("Liked", "B", None),
            Track::new("Failed Song", "C", None),
            Track::new("New", "D", None),
        ];
        let destination = vec![Track::new("Liked!", "b", None).with_id("l")];
        let mut stats = RunStats::default();
        let missing = missing_tracks(&source, &destination, &ledger, &mut stats);

        let titles: Vec<&str> = missing.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Song A", "New"]);
        assert_eq!(stats.already_liked, 1);
        assert_eq!(stats.already_in_ledger, 1);
        assert_eq!(stats.missing, 2);
    }

    #[test]
    fn test_max_tracks_caps_search() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let normalizer = Normalizer::default();
        let source = FakeSource(vec![Track::new("One", "A", None), Track::new("Two", "B", None)]);
        let destination = FakeDestination::new(Vec::new());
        let pipeline = Pipeline::new(
            &source,
            &destination,
            &normalizer,
            &paths,
            PipelineSettings {
                max_tracks: 1,
                ..settings()
            },
        );
        let stats = pipeline.search().unwrap();
        assert_eq!(stats.searched, 1);
        assert_eq!(stats.no_candidates, 1);
        let results: Vec<SearchResult> = read_json(&paths.search_results).unwrap().unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_rescore_with_stricter_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let normalizer = Normalizer::default();
        let source = FakeSource(vec![Track::new("Wicked Games", "Parra for Cuva", None)]);
        let destination = FakeDestination::new(vec![Track::new("Wicked Game", "Parra For Cuva", None).with_id("w")]);

        let lenient = Pipeline::new(&source, &destination, &normalizer, &paths, settings());
        assert_eq!(lenient.search().unwrap().selected, 1);

        let strict = Pipeline::new(
            &source,
            &destination,
            &normalizer,
            &paths,
            PipelineSettings {
                threshold: 0.99,
                ..settings()
            },
        );
        let stats = strict.rescore().unwrap();
        assert_eq!(stats.selected, 0);
        assert_eq!(stats.not_selected, 1);
        assert_eq!(destination.searches.get(), 1);
    }

    #[test]
    fn test_add_requires_match_dump() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let normalizer = Normalizer::default();
        let source = FakeSource(Vec::new());
        let destination = FakeDestination::new(Vec::new());
        let pipeline = Pipeline::new(&source, &destination, &normalizer, &paths, settings());
        assert!(matches!(pipeline.add(), Err(SyncError::Config(_))));
    }

    #[test]
    fn test_add_from_match_dump() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let normalizer = Normalizer::default();
        let source = FakeSource(vec![Track::new("Song A", "Artist X", None)]);
        let destination = FakeDestination::new(vec![Track::new("Song A", "Artist X", None).with_id("abc")]);
        let pipeline = Pipeline::new(&source, &destination, &normalizer, &paths, settings());

        pipeline.search().unwrap();
        assert!(destination.add_calls.borrow().is_empty());

        let stats = pipeline.add().unwrap();
        assert_eq!(stats.added, 1);
        // Replaying the same dump records the duplicate instead of re-adding
        let stats = pipeline.add().unwrap();
        assert_eq!(stats.added, 0);
        assert_eq!(stats.not_added, 1);
        assert_eq!(destination.add_calls.borrow().len(), 1);
    }
}
