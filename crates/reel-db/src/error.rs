//! # Store Errors
//!
//! ```text
//! sqlx::Error ──┐
//!               ├──► DbError ──► SyncError::Store / SyncError::Library (reel-sync)
//! CoreError  ───┘      │
//!                      └── Domain(CoreError) carries library rule violations
//!                          (duplicate media, missing entry, bad index) unchanged
//! ```
//!
//! Constraint failures are classified with sqlx's [`ErrorKind`] instead of
//! parsing SQLite's message text. The message is kept for logs.

use reel_core::CoreError;
use sqlx::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index rejected the write. With the duplicate check done
    /// inside the same transaction this only happens on a racing add.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    #[error("Could not open the library database: {0}")]
    ConnectionFailed(String),

    #[error("Schema migration failed: {0}")]
    MigrationFailed(String),

    /// Rejected statement, including CHECK and NOT NULL failures.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Timed out waiting for a database connection")]
    PoolExhausted,

    /// A stored JSON column (genres, operation payload) did not round-trip.
    #[error("Stored JSON is invalid: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Domain(#[from] CoreError),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Returns the library rule violation, if this is one.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            DbError::Domain(err) => Some(err),
            _ => None,
        }
    }

    /// True when the same call may succeed once the pool or file lock frees up.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DbError::PoolExhausted | DbError::ConnectionFailed(_) | DbError::TransactionFailed(_)
        )
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Row", "unknown"),

            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.kind() {
                    ErrorKind::UniqueViolation => DbError::UniqueViolation {
                        // "UNIQUE constraint failed: library_entries.media_id"
                        field: message
                            .rsplit(": ")
                            .next()
                            .unwrap_or("unknown")
                            .to_string(),
                        value: "?".to_string(),
                    },
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { message },
                    _ => DbError::QueryFailed(message),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            sqlx::Error::Io(e) => DbError::ConnectionFailed(e.to_string()),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::Internal(format!("cannot decode column {index}: {source}"))
            }

            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
