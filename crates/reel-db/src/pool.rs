//! # Database Handle
//!
//! Opens the Reel SQLite store and hands out repositories.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Opening the store                               │
//! │                                                                         │
//! │  DbConfig::new(<data dir>/reel.db)     DbConfig::in_memory()           │
//! │       │                                     │                           │
//! │       ▼                                     ▼                           │
//! │  create parent dir, WAL, busy timeout   one pinned connection          │
//! │       │                                     │                           │
//! │       └──────────────┬──────────────────────┘                           │
//! │                      ▼                                                  │
//! │            embedded migrations (001_initial_schema)                    │
//! │                      │                                                  │
//! │      ┌───────────────┼────────────────────┐                             │
//! │      ▼               ▼                    ▼                             │
//! │  library()        media()              queue()                         │
//! │  UI mutations     catalog cache        sync engine drain               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The UI layer and the scheduler write from different tasks. WAL keeps
//! reads unblocked during a drain, and the busy timeout makes a writer wait
//! for the other one instead of failing with `SQLITE_BUSY`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::library::LibraryStore;
use crate::repository::media::MediaRepository;
use crate::repository::queue::OperationQueueRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Where the store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    /// Private to one connection; gone when the pool closes.
    Memory,
}

/// Options for opening the store.
///
/// ```rust,ignore
/// let config = DbConfig::new(data_dir.join("reel.db")).pool_size(4);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub location: DbLocation,

    /// Upper bound on pooled connections. Always 1 for in-memory stores.
    pub pool_size: u32,

    /// How long to wait for a free pooled connection.
    pub acquire_timeout: Duration,

    /// How long a writer waits on a locked database before giving up.
    pub busy_timeout: Duration,

    pub run_migrations: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            location: DbLocation::File(path.into()),
            pool_size: 4,
            acquire_timeout: Duration::from_secs(10),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// A throwaway store, migrated on open. Used by tests.
    pub fn in_memory() -> Self {
        DbConfig {
            location: DbLocation::Memory,
            pool_size: 1,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::ZERO,
            run_migrations: true,
        }
    }

    pub fn pool_size(mut self, size: u32) -> Self {
        self.pool_size = size.max(1);
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = match &self.location {
            DbLocation::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .busy_timeout(self.busy_timeout),
            DbLocation::Memory => SqliteConnectOptions::new().in_memory(true),
        };
        options.foreign_keys(true)
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new().acquire_timeout(self.acquire_timeout);
        match self.location {
            DbLocation::File(_) => options.max_connections(self.pool_size).min_connections(1),
            // Each connection to an in-memory database sees its own empty
            // database, so the pool must never replace or add one.
            DbLocation::Memory => options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>),
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared handle to the store. Clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (and by default migrates) the store.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        match &config.location {
            DbLocation::File(path) => {
                info!(path = %path.display(), "Opening library database");
                ensure_parent_dir(path)?;
            }
            DbLocation::Memory => debug!("Opening in-memory library database"),
        }

        let pool = config
            .pool_options()
            .connect_with(config.connect_options())
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let db = Database { pool };
        if config.run_migrations {
            migrations::run_migrations(&db.pool).await?;
        }

        Ok(db)
    }

    /// The raw pool, for `pool().begin()` work spanning repositories.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn media(&self) -> MediaRepository {
        MediaRepository::new(self.pool.clone())
    }

    /// The user's library.
    ///
    /// ```rust,ignore
    /// let watching = db.library().fetch_by_status(EntryStatus::Watching).await?;
    /// ```
    pub fn library(&self) -> LibraryStore {
        LibraryStore::new(self.pool.clone())
    }

    pub fn queue(&self) -> OperationQueueRepository {
        OperationQueueRepository::new(self.pool.clone())
    }

    pub async fn close(&self) {
        info!("Closing library database");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

fn ensure_parent_dir(path: &Path) -> DbResult<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir).map_err(|e| {
            DbError::ConnectionFailed(format!("cannot create {}: {e}", dir.display()))
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
        assert_eq!(db.queue().count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_file_store_creates_missing_directories() {
        let dir = std::env::temp_dir().join(format!("reel-db-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("reel.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        assert!(db.health_check().await);
        assert!(path.exists());

        db.close().await;
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_pool_size_floor() {
        let config = DbConfig::new("reel.db").pool_size(0).run_migrations(false);
        assert_eq!(config.pool_size, 1);
        assert!(!config.run_migrations);
        assert_eq!(DbConfig::in_memory().location, DbLocation::Memory);
    }
}
