//! Reconciliation ledger: every add attempt ever recorded.
//!
//! The ledger gates future work in two ways. `contains_id` stops a
//! destination id from being added twice; `excludes` keeps tracks that were
//! already handled (whatever the outcome) out of the next search pass.
//! Entries are only ever appended during a run and every append rewrites the
//! whole file.

use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};

use crate::error::SyncResult;
use crate::models::{LedgerEntry, LedgerStatus, Track};
use crate::normalize::normalize_text;
use crate::snapshot::{read_json, write_json};

/// Identity key for diffing: normalized (title, artist).
pub type TrackKey = (String, String);

pub fn track_key(title: &str, artist: &str) -> TrackKey {
    (normalize_text(title), normalize_text(artist))
}

pub struct Ledger {
    path: PathBuf,
    entries: Vec<LedgerEntry>,
    added_ids: FxHashSet<String>,
    attempted: FxHashSet<TrackKey>,
}

impl Ledger {
    /// Load the ledger at `path`; an absent file is an empty ledger.
    pub fn load(path: &Path) -> SyncResult<Self> {
        let entries: Vec<LedgerEntry> = read_json(path)?.unwrap_or_default();
        tracing::info!("Ledger {} holds {} entries", path.display(), entries.len());
        let mut ledger = Self {
            path: path.to_path_buf(),
            entries: Vec::with_capacity(entries.len()),
            added_ids: FxHashSet::default(),
            attempted: FxHashSet::default(),
        };
        for entry in entries {
            ledger.index(&entry);
            ledger.entries.push(entry);
        }
        Ok(ledger)
    }

    fn index(&mut self, entry: &LedgerEntry) {
        if entry.status == LedgerStatus::Added {
            if let Some(id) = &entry.destination_id {
                self.added_ids.insert(id.clone());
            }
        }
        self.attempted
            .insert(track_key(&entry.original_title, &entry.original_artist));
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `id` was already added to the destination library.
    pub fn contains_id(&self, id: &str) -> bool {
        self.added_ids.contains(id)
    }

    /// Whether the track was already attempted in an earlier run.
    pub fn excludes(&self, track: &Track) -> bool {
        self.attempted.contains(&track_key(&track.title, &track.artist))
    }

    /// Append entries in order and persist the merged ledger.
    pub fn append<I>(&mut self, entries: I) -> SyncResult<()>
    where
        I: IntoIterator<Item = LedgerEntry>,
    {
        let before = self.entries.len();
        for entry in entries {
            self.index(&entry);
            self.entries.push(entry);
        }
        if self.entries.len() == before {
            return Ok(());
        }
        self.save()
    }

    pub fn save(&self) -> SyncResult<()> {
        write_json(&self.path, &self.entries)
    }

    /// Entry counts per status.
    pub fn status_counts(&self) -> FxHashMap<LedgerStatus, usize> {
        let mut counts = FxHashMap::default();
        for entry in &self.entries {
            *counts.entry(entry.status).or_insert(0) += 1;
        }
        counts
    }

    /// Destination ids recorded as added more than once (files merged by
    /// hand or written by older tooling).
    pub fn duplicate_added_ids(&self) -> Vec<String> {
        let mut seen = FxHashSet::default();
        let mut duplicates = Vec::new();
        for entry in &self.entries {
            if entry.status != LedgerStatus::Added {
                continue;
            }
            if let Some(id) = &entry.destination_id {
                if !seen.insert(id.as_str()) && !duplicates.contains(id) {
                    duplicates.push(id.clone());
                }
            }
        }
        duplicates
    }

    /// Offline de-duplication: keep the first `added` entry per destination
    /// id and drop later `added` repeats. Returns the number removed. Not
    /// called during a run.
    pub fn dedup_by_destination_id(&mut self) -> usize {
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let before = self.entries.len();
        self.entries.retain(|entry| match (&entry.status, &entry.destination_id) {
            (LedgerStatus::Added, Some(id)) => seen.insert(id.clone()),
            _ => true,
        });
        before - self.entries.len()
    }
}
