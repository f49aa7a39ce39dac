//! Add orchestration: turns match decisions into library writes.
//!
//! Per decision:
//! - not selected, or no destination id → not attempted, nothing recorded
//! - selected, id already added → `not_added`, recorded for audit
//! - selected, new id → add; `added` or `failed`, recorded either way
//!
//! Rate-limit responses pause the batch for a cooldown instead of aborting
//! it. Ledger entries are appended in decision order.

use std::thread;
use std::time::Duration;

use crate::error::{ProviderError, SyncResult};
use crate::ledger::Ledger;
use crate::models::{LedgerEntry, LedgerStatus, MatchDecision, MatchStatus};
use crate::providers::DestinationLibrary;

/// Target of the per-attempt operational log lines (also routed to the
/// append-only log file by the binary).
pub const ADD_LOG_TARGET: &str = "likes_sync::adds";

pub const REASON_ADDED: &str = "Successfully added";
pub const REASON_ALREADY_ADDED: &str = "Track already added";
pub const REASON_NOT_ATTEMPTED: &str =
    "Track not selected due to low similarity score or missing destination ID";

// ============================================================================
// Pacing
// ============================================================================

/// Delays between destination writes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    /// Pause after every add call.
    pub add_delay: Duration,
    /// Pause after a rate-limit response (or the server's Retry-After, if longer).
    pub rate_limit_cooldown: Duration,
    /// Extra attempts for an add that was rate limited.
    pub rate_limit_retries: u32,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            add_delay: Duration::from_secs(1),
            rate_limit_cooldown: Duration::from_secs(30),
            rate_limit_retries: 1,
        }
    }
}

impl Pacing {
    /// No waiting at all (tests, dry runs).
    pub fn none() -> Self {
        Self {
            add_delay: Duration::ZERO,
            rate_limit_cooldown: Duration::ZERO,
            rate_limit_retries: 0,
        }
    }

    pub fn cooldown_for(&self, err: &ProviderError) -> Duration {
        match err {
            ProviderError::RateLimited {
                retry_after: Some(server),
            } => (*server).max(self.rate_limit_cooldown),
            _ => self.rate_limit_cooldown,
        }
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

// ============================================================================
// Outcomes
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    NotAttempted,
    AlreadyAdded,
    Added,
    Failed(String),
    /// Dry run: would have been added.
    Skipped,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct AddReport {
    pub outcomes: Vec<AddOutcome>,
}

impl AddReport {
    fn count(&self, pred: impl Fn(&AddOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }

    pub fn added(&self) -> usize {
        self.count(|o| *o == AddOutcome::Added)
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, AddOutcome::Failed(_)))
    }

    pub fn already_added(&self) -> usize {
        self.count(|o| *o == AddOutcome::AlreadyAdded)
    }

    pub fn not_attempted(&self) -> usize {
        self.count(|o| *o == AddOutcome::NotAttempted)
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| *o == AddOutcome::Skipped)
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct AddOrchestrator<'a, D: DestinationLibrary + ?Sized> {
    destination: &'a D,
    pacing: Pacing,
    dry_run: bool,
}

impl<'a, D: DestinationLibrary + ?Sized> AddOrchestrator<'a, D> {
    pub fn new(destination: &'a D, pacing: Pacing) -> Self {
        Self {
            destination,
            pacing,
            dry_run: false,
        }
    }

    /// Log what would be added without calling the destination or
    /// touching the ledger.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Process decisions in order, recording outcomes in the ledger as they
    /// happen. Only ledger persistence errors abort the batch.
    pub fn run(&self, decisions: &[MatchDecision], ledger: &mut Ledger) -> SyncResult<AddReport> {
        let mut report = AddReport::default();
        for decision in decisions {
            let outcome = self.process(decision, ledger)?;
            report.outcomes.push(outcome);
        }
        tracing::info!(
            "Add pass finished: {} added, {} failed, {} already added, {} not attempted",
            report.added(),
            report.failed(),
            report.already_added(),
            report.not_attempted()
        );
        Ok(report)
    }

    fn process(&self, decision: &MatchDecision, ledger: &mut Ledger) -> SyncResult<AddOutcome> {
        let title = &decision.original_title;
        let artist = &decision.original_artist;

        let id = match (&decision.status, &decision.best_variant.destination_id) {
            (MatchStatus::Selected, Some(id)) if !id.trim().is_empty() => id.clone(),
            _ => {
                tracing::warn!(target: ADD_LOG_TARGET, "Not attempted: {} by {} - {}", title, artist, REASON_NOT_ATTEMPTED);
                return Ok(AddOutcome::NotAttempted);
            }
        };

        if ledger.contains_id(&id) {
            tracing::info!(target: ADD_LOG_TARGET, "Already added: {} by {} - {}", title, artist, REASON_ALREADY_ADDED);
            if !self.dry_run {
                ledger.append([LedgerEntry::from_decision(decision, LedgerStatus::NotAdded, REASON_ALREADY_ADDED)])?;
            }
            return Ok(AddOutcome::AlreadyAdded);
        }

        if self.dry_run {
            tracing::info!(
                "Would add: {} by {} -> {} ({:.3})",
                title,
                artist,
                id,
                decision.best_variant.score()
            );
            return Ok(AddOutcome::Skipped);
        }

        let (status, reason, outcome) = match self.add_with_cooldown(&id) {
            Ok(()) => {
                tracing::info!(target: ADD_LOG_TARGET, "Added: {} by {} - {}", title, artist, REASON_ADDED);
                (LedgerStatus::Added, REASON_ADDED.to_string(), AddOutcome::Added)
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::error!(target: ADD_LOG_TARGET, "Failed to add: {} by {} - {}", title, artist, reason);
                (LedgerStatus::Failed, reason.clone(), AddOutcome::Failed(reason))
            }
        };

        ledger.append([LedgerEntry::from_decision(decision, status, reason)])?;
        Ok(outcome)
    }

    /// One add call, retried after a cooldown while the destination keeps
    /// reporting rate limits and retries remain.
    fn add_with_cooldown(&self, id: &str) -> Result<(), ProviderError> {
        let ids = [id.to_string()];
        let mut retries_left = self.pacing.rate_limit_retries;
        loop {
            match self.destination.add_tracks(&ids) {
                Ok(()) => {
                    pause(self.pacing.add_delay);
                    return Ok(());
                }
                Err(e) if e.is_rate_limit() => {
                    let cooldown = self.pacing.cooldown_for(&e);
                    tracing::warn!(
                        "API rate limit exceeded, pausing for {} seconds...",
                        cooldown.as_secs()
                    );
                    pause(cooldown);
                    if retries_left == 0 {
                        return Err(e);
                    }
                    retries_left -= 1;
                }
                Err(e) => {
                    pause(self.pacing.add_delay);
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SearchVariant, Track};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Destination that records add calls and replays scripted failures.
    #[derive(Default)]
    struct FakeDestination {
        added: RefCell<Vec<String>>,
        failures: RefCell<VecDeque<ProviderError>>,
    }

    impl DestinationLibrary for FakeDestination {
        fn liked_tracks(&self) -> Result<Vec<Track>, ProviderError> {
            Ok(Vec::new())
        }

        fn search_tracks(&self, _: &str, _: usize) -> Result<Vec<Track>, ProviderError> {
            Ok(Vec::new())
        }

        fn add_tracks(&self, ids: &[String]) -> Result<(), ProviderError> {
            if let Some(err) = self.failures.borrow_mut().pop_front() {
                return Err(err);
            }
            self.added.borrow_mut().extend(ids.iter().cloned());
            Ok(())
        }
    }

    fn decision(title: &str, id: Option<&str>, status: MatchStatus) -> MatchDecision {
        MatchDecision {
            original_title: title.to_string(),
            original_artist: "Artist".to_string(),
            original_album: "Unknown Album".to_string(),
            best_variant: SearchVariant {
                original_title: title.to_string(),
                original_artist: "Artist".to_string(),
                destination_title: title.to_string(),
                destination_artist: "Artist".to_string(),
                destination_id: id.map(str::to_string),
                similarity_score: Some(0.9),
                ..Default::default()
            },
            status,
            reason: String::new(),
        }
    }

    fn fresh_ledger(dir: &tempfile::TempDir) -> Ledger {
        Ledger::load(&dir.path().join("ledger.json")).unwrap()
    }

    #[test]
    fn test_not_selected_is_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = fresh_ledger(&dir);
        let dest = FakeDestination::default();
        let decisions = vec![
            decision("Low", Some("a"), MatchStatus::NotSelected),
            decision("NoId", None, MatchStatus::Selected),
        ];
        let report = AddOrchestrator::new(&dest, Pacing::none()).run(&decisions, &mut ledger).unwrap();
        assert_eq!(report.not_attempted(), 2);
        assert!(ledger.is_empty());
        assert!(dest.added.borrow().is_empty());
    }

    #[test]
    fn test_adds_and_records_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = fresh_ledger(&dir);
        let dest = FakeDestination::default();
        let decisions = vec![
            decision("One", Some("a"), MatchStatus::Selected),
            decision("Two", Some("b"), MatchStatus::Selected),
        ];
        let report = AddOrchestrator::new(&dest, Pacing::none()).run(&decisions, &mut ledger).unwrap();
        assert_eq!(report.added(), 2);
        assert_eq!(*dest.added.borrow(), vec!["a".to_string(), "b".to_string()]);
        let titles: Vec<&str> = ledger.entries().iter().map(|e| e.original_title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Two"]);
        assert!(ledger.entries().iter().all(|e| e.status == LedgerStatus::Added));
    }

    #[test]
    fn test_second_run_never_adds_twice() {
        let dir = tempfile::tempdir().unwrap();
        let dest = FakeDestination::default();
        let decisions = vec![
            decision("One", Some("a"), MatchStatus::Selected),
            // Same id matched for a second source track in the same batch
            decision("One (Live)", Some("a"), MatchStatus::Selected),
        ];

        let mut ledger = fresh_ledger(&dir);
        AddOrchestrator::new(&dest, Pacing::none()).run(&decisions, &mut ledger).unwrap();
        let first_run = ledger.entries().to_vec();

        let mut ledger = fresh_ledger(&dir);
        let report = AddOrchestrator::new(&dest, Pacing::none()).run(&decisions, &mut ledger).unwrap();

        assert_eq!(*dest.added.borrow(), vec!["a".to_string()]);
        assert_eq!(report.already_added(), 2);
        // Second ledger is a superset of the first
        assert_eq!(&ledger.entries()[..first_run.len()], first_run.as_slice());
        let added = ledger.entries().iter().filter(|e| e.status == LedgerStatus::Added).count();
        assert_eq!(added, 1);
        assert!(ledger
            .entries()
            .iter()
            .filter(|e| e.status == LedgerStatus::NotAdded)
            .all(|e| e.reason == REASON_ALREADY_ADDED));
    }

    #[test]
    fn test_failure_is_recorded_and_batch_continues() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = fresh_ledger(&dir);
        let dest = FakeDestination::default();
        dest.failures.borrow_mut().push_back(ProviderError::Api {
            status: 500,
            message: "boom".to_string(),
        });
        let decisions = vec![
            decision("One", Some("a"), MatchStatus::Selected),
            decision("Two", Some("b"), MatchStatus::Selected),
        ];
        let report = AddOrchestrator::new(&dest, Pacing::none()).run(&decisions, &mut ledger).unwrap();
        assert_eq!(report.failed(), 1);
        assert_eq!(report.added(), 1);
        assert_eq!(ledger.entries()[0].status, LedgerStatus::Failed);
        assert!(ledger.entries()[0].reason.contains("boom"));
        assert!(!ledger.contains_id("a"));
        assert!(ledger.contains_id("b"));
    }

    #[test]
    fn test_rate_limit_retries_after_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = fresh_ledger(&dir);
        let dest = FakeDestination::default();
        dest.failures
            .borrow_mut()
            .push_back(ProviderError::RateLimited { retry_after: None });
        let pacing = Pacing {
            rate_limit_retries: 1,
            ..Pacing::none()
        };
        let decisions = vec![decision("One", Some("a"), MatchStatus::Selected)];
        let report = AddOrchestrator::new(&dest, pacing).run(&decisions, &mut ledger).unwrap();
        assert_eq!(report.added(), 1);
        assert!(ledger.contains_id("a"));
    }

    #[test]
    fn test_rate_limit_without_retries_fails_item() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = fresh_ledger(&dir);
        let dest = FakeDestination::default();
        dest.failures
            .borrow_mut()
            .push_back(ProviderError::RateLimited { retry_after: None });
        let decisions = vec![
            decision("One", Some("a"), MatchStatus::Selected),
            decision("Two", Some("b"), MatchStatus::Selected),
        ];
        let report = AddOrchestrator::new(&dest, Pacing::none()).run(&decisions, &mut ledger).unwrap();
        assert_eq!(report.outcomes[0], AddOutcome::Failed("API rate limit exceeded".to_string()));
        assert_eq!(report.outcomes[1], AddOutcome::Added);
    }

    #[test]
    fn test_dry_run_leaves_everything_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = fresh_ledger(&dir);
        let dest = FakeDestination::default();
        let decisions = vec![decision("One", Some("a"), MatchStatus::Selected)];
        let report = AddOrchestrator::new(&dest, Pacing::none())
            .dry_run(true)
            .run(&decisions, &mut ledger)
            .unwrap();
        assert_eq!(report.skipped(), 1);
        assert!(dest.added.borrow().is_empty());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_cooldown_respects_retry_after() {
        let pacing = Pacing::default();
        let short = ProviderError::RateLimited {
            retry_after: Some(Duration::from_secs(5)),
        };
        let long = ProviderError::RateLimited {
            retry_after: Some(Duration::from_secs(120)),
        };
        assert_eq!(pacing.cooldown_for(&short), Duration::from_secs(30));
        assert_eq!(pacing.cooldown_for(&long), Duration::from_secs(120));
    }
}
