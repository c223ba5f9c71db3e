//! # reel-sync: Sync Engine for Reel
//!
//! This crate keeps the local watch list in step with the remote list
//! service. Every mutation lands in SQLite first; the engine replays the
//! operation queue against the remote and pulls remote changes back in.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Reel Sync Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                     Tracker (UI entry point)                     │  │
//! │  │   local write ──► enqueue operation ──► SchedulerHandle::trigger │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ SyncScheduler  │  │   SyncEngine   │  │     RemoteClient       │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Interval tick  │─►│ FIFO drain     │─►│ GraphQL over HTTP      │    │
//! │  │ + triggers     │  │ Pull + LWW     │  │ Rate-limit backoff     │    │
//! │  │ + shutdown     │  │ reconcile      │  │ Bearer credentials     │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  STATUS EVENTS (to the UI via SyncEventEmitter):                       │
//! │  • status   - Idle / Draining / Pulling, pending count, last sync      │
//! │  • progress - Drain progress (pending, applied)                        │
//! │  • error    - Failure message and whether a retry may help             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`tracker`] - Library facade that pairs local writes with queued ops
//! - [`engine`] - Queue drain, remote pull and reconciliation
//! - [`scheduler`] - Background interval and trigger loop
//! - [`remote`] - GraphQL client, typed operations, HTTP transport
//! - [`events`] - Status events for the UI layer
//! - [`config`] - TOML configuration with environment overrides
//! - [`error`] - Sync error types and categories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use reel_db::{Database, DbConfig};
//! use reel_sync::{ReelConfig, RemoteClient, SyncEngine, SyncScheduler, Tracker};
//!
//! let config = ReelConfig::load_or_default(None);
//! let db = Arc::new(Database::new(DbConfig::new(config.database_path().unwrap_or_else(|| "reel.db".into()))).await?);
//!
//! let remote = RemoteClient::from_config(&config, Arc::new(|| token_store.current()))?;
//! let engine = Arc::new(SyncEngine::new(db.clone(), remote, config.sync.clone()));
//!
//! let (scheduler, handle) = SyncScheduler::new(engine.clone(), &config.sync);
//! scheduler.spawn();
//!
//! let tracker = Tracker::new(db, engine).with_scheduler(handle);
//! tracker.update_progress(&entry_id, 12).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod remote;
pub mod scheduler;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{DatabaseSettings, ReelConfig, RemoteSettings, RetrySettings, SyncSettings};
pub use engine::{DrainReport, PullReport, SyncEngine};
pub use error::{ErrorCategory, RemoteError, SyncError, SyncResult};
pub use events::{ChannelEmitter, NoOpEmitter, SyncEvent, SyncEventEmitter, SyncState, SyncStatus};
pub use remote::{
    CredentialProvider, GraphQlOperation, HttpTransport, RemoteClient, ReqwestTransport,
    RetryPolicy,
};
pub use scheduler::{SchedulerHandle, SyncScheduler};
pub use tracker::Tracker;
