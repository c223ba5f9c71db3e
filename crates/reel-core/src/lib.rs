//! # reel-core: Pure Domain Logic for Reel
//!
//! This crate contains the domain model of the watch-list tracker as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Reel Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    UI layer (external)                          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │           reel-sync (Tracker, SyncEngine, RemoteClient)         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              reel-db (LibraryStore, OperationQueue)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ reel-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ ordering  │  │ reconcile │  │ validation│  │   │
//! │  │   │  Entry    │  │ reorder   │  │  decide   │  │ progress  │  │   │
//! │  │   │  Queue op │  │ renumber  │  │  summary  │  │  score    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (MediaItem, LibraryEntry, QueuedOperation, ...)
//! - [`ordering`] - Gap-free sort position arithmetic
//! - [`reconcile`] - Last-writer-wins decision for pulled entries
//! - [`validation`] - Progress and score rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use reel_core::ordering::reorder;
//! use reel_core::EntryStatus;
//!
//! let watching = ["A", "B", "C", "D"];
//! let reordered = reorder(&watching, EntryStatus::Watching, 0, 2).unwrap();
//! assert_eq!(reordered, vec!["B", "C", "A", "D"]);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ordering;
pub mod reconcile;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use reconcile::{ReconcileAction, ReconcileSummary, RemoteEntrySnapshot};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Highest score, in tenths (10.0).
pub const MAX_SCORE_TENTHS: u8 = 100;

/// Attempts after which a queued operation is reported as exhausted.
///
/// Exhausted operations stay queued and are retried on the next drain;
/// they are never dropped.
pub const MAX_QUEUE_ATTEMPTS: u32 = 3;

/// Retries granted to a single remote call that is rate limited.
pub const MAX_RATE_LIMIT_RETRIES: u32 = 3;
