//! # Repository Module
//!
//! Database repository implementations for Reel.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  Tracker / SyncEngine                                                  │
//! │       │                                                                 │
//! │       │  db.library().move_between_lists(id, Completed)                │
//! │       ▼                                                                 │
//! │  LibraryStore ─────────┐                                               │
//! │  ├── add / delete      │ upserts media in the same transaction         │
//! │  ├── update_*          ▼                                               │
//! │  ├── move / reorder   MediaRepository                                  │
//! │  └── apply_remote     ├── upsert (genres normalized)                   │
//! │                       └── get / list                                   │
//! │                                                                         │
//! │  OperationQueueRepository                                              │
//! │  ├── enqueue / pending (FIFO)                                          │
//! │  ├── record_failure                                                    │
//! │  └── complete  (remove + remote id + clear dirty, one transaction)     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`library::LibraryStore`] - Library entries and their sort positions
//! - [`media::MediaRepository`] - Cached catalog entries
//! - [`queue::OperationQueueRepository`] - Remote-bound operation queue

pub mod library;
pub mod media;
pub mod queue;
