//! # Error Types
//!
//! Domain-specific error types for reel-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  reel-core errors (this file)                                          │
//! │  ├── CoreError        - Library rule violations                        │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  reel-db errors (separate crate)                                       │
//! │  └── DbError          - Store failures, wraps CoreError                │
//! │                                                                         │
//! │  reel-sync errors (separate crate)                                     │
//! │  ├── RemoteError      - Network / API / decoding / rate limit          │
//! │  └── SyncError        - What the UI layer sees                         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → SyncError → UI          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::EntryStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Library rule violations.
///
/// These are local-validation failures. They are always surfaced
/// synchronously to the caller and never retried.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An entry for this media item is already in the library.
    #[error("Media {media_id} is already in the library")]
    DuplicateEntry { media_id: i64 },

    /// No library entry with this id.
    #[error("Library entry not found: {0}")]
    EntryNotFound(String),

    /// Index outside `[0, len)` for the given status list.
    ///
    /// ## User Workflow
    /// ```text
    /// reorder(watching, from: 4, to: 0)   (watching has 3 entries)
    ///      │
    ///      ▼
    /// InvalidIndex { status: watching, index: 4, len: 3 }
    /// ```
    #[error("Index {index} is out of range for {status} (len {len})")]
    InvalidIndex {
        status: EntryStatus,
        index: usize,
        len: usize,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., undecodable payload).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
