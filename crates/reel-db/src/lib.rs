//! # reel-db: Database Layer for Reel
//!
//! This crate provides local persistence for the watch-list tracker.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Reel Data Flow                                 │
//! │                                                                         │
//! │  Tracker::update_progress(id, 12)                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     reel-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ LibraryStore  │    │ 001_initial_ │  │   │
//! │  │   │ SqlitePool    │◄───│ MediaRepo     │    │ schema.sql   │  │   │
//! │  │   │ Management    │    │ QueueRepo     │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   <platform data dir>/reel.db                                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Library store, media cache, operation queue
//!
//! ## Usage
//!
//! ```rust,ignore
//! use reel_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/reel.db")).await?;
//!
//! let entry = db.library().add(&media, EntryStatus::Watching, 0, None).await?;
//! db.queue().enqueue(&NewOperation::status(entry.media_id, entry.status)).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, DbLocation};

// Repository re-exports for convenience
pub use repository::library::{LibraryStore, LocalChange};
pub use repository::media::MediaRepository;
pub use repository::queue::OperationQueueRepository;
