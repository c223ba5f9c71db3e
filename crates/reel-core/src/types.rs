//! # Domain Types
//!
//! Core domain types used throughout Reel.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   MediaItem     │   │  LibraryEntry   │   │ QueuedOperation │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (remote)    │◄──│  media_id (FK)  │   │  id (UUID)      │       │
//! │  │  titles         │   │  status         │   │  kind           │       │
//! │  │  episodes       │   │  progress       │   │  media_id       │       │
//! │  │  genres         │   │  sort_position  │   │  payload (JSON) │       │
//! │  └─────────────────┘   │  dirty          │   │  attempts       │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   EntryStatus   │   │     Score       │   │   SyncCursor    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Watching       │   │  tenths (u8)    │   │  last_synced_at │       │
//! │  │  Completed ...  │   │  85 = 8.5       │   │  mode           │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! - `LibraryEntry::id`: UUID v4, created offline, never leaves the device
//! - `LibraryEntry::remote_id`: the remote list-entry id, learned after the first save

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, ValidationError};
use crate::MAX_SCORE_TENTHS;

// =============================================================================
// Entry Status
// =============================================================================

/// The list a library entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Watching,
    Completed,
    PlanToWatch,
    OnHold,
    Dropped,
}

impl EntryStatus {
    /// All statuses in display order.
    pub const ALL: [EntryStatus; 5] = [
        EntryStatus::Watching,
        EntryStatus::Completed,
        EntryStatus::PlanToWatch,
        EntryStatus::OnHold,
        EntryStatus::Dropped,
    ];

    /// Stable storage/wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Watching => "watching",
            EntryStatus::Completed => "completed",
            EntryStatus::PlanToWatch => "plan_to_watch",
            EntryStatus::OnHold => "on_hold",
            EntryStatus::Dropped => "dropped",
        }
    }

    /// Position of this status in display order (used for `fetch_all` sorting).
    pub fn rank(&self) -> u8 {
        match self {
            EntryStatus::Watching => 0,
            EntryStatus::Completed => 1,
            EntryStatus::PlanToWatch => 2,
            EntryStatus::OnHold => 3,
            EntryStatus::Dropped => 4,
        }
    }
}

impl Default for EntryStatus {
    fn default() -> Self {
        EntryStatus::PlanToWatch
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "watching" => Ok(EntryStatus::Watching),
            "completed" => Ok(EntryStatus::Completed),
            "plan_to_watch" => Ok(EntryStatus::PlanToWatch),
            "on_hold" => Ok(EntryStatus::OnHold),
            "dropped" => Ok(EntryStatus::Dropped),
            _ => Err(ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: EntryStatus::ALL
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect(),
            }),
        }
    }
}

// =============================================================================
// Score
// =============================================================================

/// A user score stored in tenths (85 = 8.5 out of 10).
///
/// ## Why Tenths?
/// Scores are bounded rationals. Storing tenths as an integer keeps
/// comparisons exact and avoids float drift on round trips through SQLite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Score(u8);

impl Score {
    /// Creates a score from tenths, rejecting values above 10.0.
    pub fn from_tenths(tenths: u8) -> Result<Self, ValidationError> {
        if tenths > MAX_SCORE_TENTHS {
            return Err(ValidationError::OutOfRange {
                field: "score".to_string(),
                min: 0,
                max: MAX_SCORE_TENTHS as i64,
            });
        }
        Ok(Score(tenths))
    }

    /// Creates a score from a decimal value (e.g. 8.5), rounded to tenths.
    pub fn from_decimal(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() || value < 0.0 || value > (MAX_SCORE_TENTHS as f64) / 10.0 {
            return Err(ValidationError::OutOfRange {
                field: "score".to_string(),
                min: 0,
                max: (MAX_SCORE_TENTHS / 10) as i64,
            });
        }
        Ok(Score((value * 10.0).round() as u8))
    }

    #[inline]
    pub const fn tenths(&self) -> u8 {
        self.0
    }

    /// Returns the score as a decimal (for display and the wire format).
    #[inline]
    pub fn as_decimal(&self) -> f64 {
        self.0 as f64 / 10.0
    }
}

// =============================================================================
// Media Item
// =============================================================================

/// Catalog format reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaFormat {
    Tv,
    TvShort,
    Movie,
    Special,
    Ova,
    Ona,
    Music,
}

/// A remote-identified catalog entry.
///
/// Read-only from the client's perspective; refreshed on discovery and pulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MediaItem {
    /// Remote catalog id.
    pub id: i64,
    pub title_romaji: String,
    pub title_english: Option<String>,
    pub title_native: Option<String>,
    pub cover_image_large: Option<String>,
    pub cover_image_medium: Option<String>,
    /// Total episode count, when the remote knows it.
    pub episodes: Option<u32>,
    pub format: Option<MediaFormat>,
    pub genres: Vec<String>,
    pub synopsis: Option<String>,
    pub site_url: Option<String>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl MediaItem {
    /// Preferred display title (English when available).
    pub fn display_title(&self) -> &str {
        self.title_english.as_deref().unwrap_or(&self.title_romaji)
    }
}

// =============================================================================
// Library Entry
// =============================================================================

/// The user's tracking state for one media item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LibraryEntry {
    /// Local identifier (UUID v4).
    pub id: String,

    /// Referenced media item. Unique across entries.
    pub media_id: i64,

    /// Remote list-entry id, once known.
    pub remote_id: Option<i64>,

    pub status: EntryStatus,

    /// Episodes watched.
    pub progress: u32,

    pub score: Option<Score>,

    /// Zero-based, gap-free position within `status`.
    pub sort_position: u32,

    /// True while a local change has not been confirmed by the remote.
    pub dirty: bool,

    #[ts(as = "String")]
    pub last_modified: DateTime<Utc>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Queued Operation
// =============================================================================

/// Kind of remote mutation waiting in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    UpdateProgress,
    UpdateStatus,
    UpdateScore,
    DeleteEntry,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::UpdateProgress => write!(f, "update_progress"),
            OperationKind::UpdateStatus => write!(f, "update_status"),
            OperationKind::UpdateScore => write!(f, "update_score"),
            OperationKind::DeleteEntry => write!(f, "delete_entry"),
        }
    }
}

/// Field values carried by a queued operation.
///
/// Each payload carries the absolute value to write, so replaying the same
/// operation twice leaves the remote in the same state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationPayload {
    Progress { progress: u32 },
    Status { status: EntryStatus },
    Score { score: Option<Score> },
    Delete { remote_id: Option<i64> },
}

impl OperationPayload {
    /// The queue kind this payload belongs to.
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationPayload::Progress { .. } => OperationKind::UpdateProgress,
            OperationPayload::Status { .. } => OperationKind::UpdateStatus,
            OperationPayload::Score { .. } => OperationKind::UpdateScore,
            OperationPayload::Delete { .. } => OperationKind::DeleteEntry,
        }
    }
}

/// A mutation to replay against the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewOperation {
    pub media_id: i64,
    pub payload: OperationPayload,
}

impl NewOperation {
    pub fn progress(media_id: i64, progress: u32) -> Self {
        NewOperation {
            media_id,
            payload: OperationPayload::Progress { progress },
        }
    }

    pub fn status(media_id: i64, status: EntryStatus) -> Self {
        NewOperation {
            media_id,
            payload: OperationPayload::Status { status },
        }
    }

    pub fn score(media_id: i64, score: Option<Score>) -> Self {
        NewOperation {
            media_id,
            payload: OperationPayload::Score { score },
        }
    }

    pub fn delete(media_id: i64, remote_id: Option<i64>) -> Self {
        NewOperation {
            media_id,
            payload: OperationPayload::Delete { remote_id },
        }
    }

    #[inline]
    pub fn kind(&self) -> OperationKind {
        self.payload.kind()
    }
}

/// A durable queue record awaiting remote application.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct QueuedOperation {
    pub id: String,
    pub kind: OperationKind,
    pub media_id: i64,
    /// JSON encoding of [`OperationPayload`].
    pub payload: String,
    pub attempts: u32,
    pub last_error: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub attempted_at: Option<DateTime<Utc>>,
}

impl QueuedOperation {
    /// Decodes the stored payload.
    pub fn decode_payload(&self) -> Result<OperationPayload, CoreError> {
        serde_json::from_str(&self.payload).map_err(|e| {
            CoreError::Validation(ValidationError::InvalidFormat {
                field: "payload".to_string(),
                reason: e.to_string(),
            })
        })
    }
}

// =============================================================================
// Sync Cursor
// =============================================================================

/// How the last pull was performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PullMode {
    Incremental,
    Full,
}

/// Session-scoped marker of the last successful pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncCursor {
    #[ts(as = "String")]
    pub last_synced_at: DateTime<Utc>,
    pub mode: PullMode,
}

impl SyncCursor {
    /// Returns true when the cursor is older than `max_age` at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        now - self.last_synced_at >= max_age
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in EntryStatus::ALL {
            assert_eq!(status.as_str().parse::<EntryStatus>().unwrap(), status);
        }
        assert!("rewatching".parse::<EntryStatus>().is_err());
    }

    #[test]
    fn test_score_bounds() {
        assert_eq!(Score::from_tenths(85).unwrap().as_decimal(), 8.5);
        assert!(Score::from_tenths(101).is_err());
        assert_eq!(Score::from_decimal(7.25).unwrap().tenths(), 73);
        assert!(Score::from_decimal(-1.0).is_err());
        assert!(Score::from_decimal(f64::NAN).is_err());
    }

    #[test]
    fn test_payload_kind_and_json_shape() {
        let op = NewOperation::progress(21, 12);
        assert_eq!(op.kind(), OperationKind::UpdateProgress);

        let json = serde_json::to_string(&op.payload).unwrap();
        assert_eq!(json, r#"{"type":"progress","progress":12}"#);
    }

    #[test]
    fn test_cursor_staleness() {
        let now = Utc::now();
        let cursor = SyncCursor {
            last_synced_at: now - chrono::Duration::minutes(10),
            mode: PullMode::Incremental,
        };
        assert!(cursor.is_stale(now, chrono::Duration::minutes(5)));
        assert!(!cursor.is_stale(now, chrono::Duration::minutes(15)));
    }
}
