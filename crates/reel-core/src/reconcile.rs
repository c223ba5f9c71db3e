//! # Reconciliation Policy
//!
//! Decides what a pulled remote entry does to local state.
//!
//! ## Conflict Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Conflict Resolution Strategy                         │
//! │                                                                         │
//! │  local missing            → INSERT (clean)                             │
//! │  local dirty              → KEEP LOCAL (pending write wins over a      │
//! │                             stale remote read; the queue drains it)    │
//! │  local clean, differs     → OVERWRITE (remote wins)                    │
//! │  local clean, identical   → UNCHANGED                                  │
//! │  local missing, unknown   → SKIPPED (media neither cached nor pulled)  │
//! │                                                                         │
//! │  local present, remote missing → untouched (no destructive pruning)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EntryStatus, LibraryEntry, MediaItem, Score};

/// Remote truth for one list entry, as fetched by a pull.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntrySnapshot {
    /// Remote list-entry id.
    pub remote_id: i64,
    pub media_id: i64,
    pub status: EntryStatus,
    pub progress: u32,
    pub score: Option<Score>,
    pub updated_at: DateTime<Utc>,
    /// Catalog data embedded in the pull, cached alongside the entry.
    pub media: Option<MediaItem>,
}

/// Outcome of comparing a remote snapshot with the local entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// No local entry; create a clean one from the remote.
    Insert,
    /// Local entry is clean and differs; remote wins.
    Overwrite,
    /// Local entry is dirty; local wins until the queue drains.
    KeepLocal,
    /// Local entry is clean and already matches.
    Unchanged,
    /// No local entry, and the media item is neither cached nor embedded in
    /// the pull, so there is nothing to attach an entry to.
    Skipped,
}

/// Applies the last-writer-wins policy for one media id.
pub fn decide(local: Option<&LibraryEntry>, remote: &RemoteEntrySnapshot) -> ReconcileAction {
    let Some(local) = local else {
        return ReconcileAction::Insert;
    };

    if local.dirty {
        return ReconcileAction::KeepLocal;
    }

    let same = local.status == remote.status
        && local.progress == remote.progress
        && local.score == remote.score
        && local.remote_id == Some(remote.remote_id);

    if same {
        ReconcileAction::Unchanged
    } else {
        ReconcileAction::Overwrite
    }
}

/// Tally of reconciliation outcomes for one pull.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub overwritten: usize,
    pub kept_local: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

impl ReconcileSummary {
    pub fn record(&mut self, action: ReconcileAction) {
        match action {
            ReconcileAction::Insert => self.inserted += 1,
            ReconcileAction::Overwrite => self.overwritten += 1,
            ReconcileAction::KeepLocal => self.kept_local += 1,
            ReconcileAction::Unchanged => self.unchanged += 1,
            ReconcileAction::Skipped => self.skipped += 1,
        }
    }

    /// Total remote entries examined.
    pub fn total(&self) -> usize {
        self.inserted + self.overwritten + self.kept_local + self.unchanged + self.skipped
    }
}
