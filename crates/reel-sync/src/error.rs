//! # Sync Error Types
//!
//! Error types for remote calls and sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Validation     │  │   Transient     │  │     Remote              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  DuplicateEntry │  │  Network        │  │  Api (4xx, no status)   │ │
//! │  │  EntryNotFound  │  │  RateLimit      │  │                         │ │
//! │  │  InvalidIndex   │  │  Api (5xx)      │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │   Corruption    │  │  Configuration  │                              │
//! │  │                 │  │                 │                              │
//! │  │  Decoding       │  │  InvalidConfig  │                              │
//! │  │  Store failures │  │  InvalidUrl     │                              │
//! │  │  QueueWrite     │  │  ConfigLoad     │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! │                                                                         │
//! │  Transient → retried automatically on the next drain                   │
//! │  Corruption → destroy the local store and run a full resync            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use reel_core::CoreError;
use reel_db::DbError;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

// =============================================================================
// Remote Error
// =============================================================================

/// Failures of a single remote GraphQL call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteError {
    /// Transport failure or timeout. Never retried by the client.
    #[error("Network error: {0}")]
    Network(String),

    /// The service reported one or more errors.
    ///
    /// `message` joins every reported message with ", ";
    /// `status_code` is the first status the service reported.
    #[error("API error{}: {message}", status_code.map(|c| format!(" ({c})")).unwrap_or_default())]
    Api {
        message: String,
        status_code: Option<u16>,
    },

    /// The body could not be decoded into the expected response type.
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Still rate limited after the retry budget was spent.
    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },
}

impl RemoteError {
    /// True if a later attempt may succeed without any change on our side.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Network(_) | RemoteError::RateLimitExceeded { .. } => true,
            RemoteError::Api {
                status_code: Some(code),
                ..
            } => *code >= 500,
            _ => false,
        }
    }

    /// True if the remote reported the record as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RemoteError::Api {
                status_code: Some(404),
                ..
            }
        )
    }
}

// =============================================================================
// Sync Error
// =============================================================================

/// Sync error type covering everything the UI layer can see.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid endpoint URL.
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Queue / Store Errors
    // =========================================================================
    /// An operation could not be persisted to the queue.
    #[error("Failed to queue operation: {0}")]
    QueueWrite(#[source] DbError),

    /// A library rule was violated.
    #[error(transparent)]
    Library(#[from] CoreError),

    /// The local store failed.
    #[error("Store error: {0}")]
    Store(DbError),

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// A remote call failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// The background scheduler has stopped. Queued work stays on disk
    /// for the next start.
    #[error("Sync scheduler has stopped")]
    Shutdown,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<DbError> for SyncError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(core) => SyncError::Library(core),
            other => SyncError::Store(other),
        }
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

/// Stable message category the UI layer keys its recovery path on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The request was rejected locally; nothing to retry.
    Validation,
    /// Network or rate limit; retried automatically.
    Transient,
    /// The remote service rejected the request.
    Remote,
    /// Local or remote data is unreadable; destroy and resync.
    Corruption,
    /// Settings are missing or malformed.
    Configuration,
}

impl SyncError {
    /// Maps this error to its category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::InvalidConfig(_)
            | SyncError::InvalidUrl(_)
            | SyncError::ConfigLoadFailed(_)
            | SyncError::ConfigSaveFailed(_) => ErrorCategory::Configuration,

            SyncError::Library(_) => ErrorCategory::Validation,

            SyncError::Remote(RemoteError::Decoding(_)) => ErrorCategory::Corruption,
            SyncError::Remote(err) if err.is_transient() => ErrorCategory::Transient,
            SyncError::Remote(_) => ErrorCategory::Remote,

            SyncError::Store(err) if err.is_transient() => ErrorCategory::Transient,
            SyncError::Store(_) | SyncError::QueueWrite(_) => ErrorCategory::Corruption,

            SyncError::Shutdown => ErrorCategory::Transient,
        }
    }

    /// True if the failed work should simply be attempted again later.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    /// Human-readable message for the UI layer.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Library(CoreError::DuplicateEntry { .. }) => {
                "This title is already in your library.".to_string()
            }
            SyncError::Library(CoreError::EntryNotFound(_)) => {
                "That library entry no longer exists.".to_string()
            }
            SyncError::Library(CoreError::InvalidIndex { .. }) => {
                "That position is outside the list.".to_string()
            }
            SyncError::Library(CoreError::Validation(err)) => err.to_string(),
            SyncError::Remote(RemoteError::RateLimitExceeded { .. }) => {
                "The service is busy. Your changes are saved and will sync shortly.".to_string()
            }
            SyncError::Remote(RemoteError::Network(_)) => {
                "You appear to be offline. Your changes are saved and will sync later.".to_string()
            }
            other => match other.category() {
                ErrorCategory::Transient => {
                    "Sync is temporarily unavailable. It will retry automatically.".to_string()
                }
                ErrorCategory::Remote => format!("The service rejected the change: {other}"),
                ErrorCategory::Corruption => {
                    "Local data needs to be rebuilt. A full resync is required.".to_string()
                }
                ErrorCategory::Configuration => format!("Settings problem: {other}"),
                ErrorCategory::Validation => other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let network = SyncError::Remote(RemoteError::Network("refused".into()));
        assert_eq!(network.category(), ErrorCategory::Transient);
        assert!(network.is_retryable());

        let throttled = SyncError::Remote(RemoteError::RateLimitExceeded { attempts: 4 });
        assert_eq!(throttled.category(), ErrorCategory::Transient);

        let decoding = SyncError::Remote(RemoteError::Decoding("eof".into()));
        assert_eq!(decoding.category(), ErrorCategory::Corruption);

        let rejected = SyncError::Remote(RemoteError::Api {
            message: "Invalid token".into(),
            status_code: Some(400),
        });
        assert_eq!(rejected.category(), ErrorCategory::Remote);
        assert!(!rejected.is_retryable());

        let outage = SyncError::Remote(RemoteError::Api {
            message: "Internal Server Error".into(),
            status_code: Some(503),
        });
        assert!(outage.is_retryable());
    }

    #[test]
    fn test_domain_errors_become_library_errors() {
        let err: SyncError = DbError::Domain(CoreError::DuplicateEntry { media_id: 7 }).into();
        assert!(matches!(err, SyncError::Library(_)));
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert_eq!(err.user_message(), "This title is already in your library.");

        let err: SyncError = DbError::QueryFailed("disk I/O error".into()).into();
        assert_eq!(err.category(), ErrorCategory::Corruption);
    }

    #[test]
    fn test_api_error_display() {
        let err = RemoteError::Api {
            message: "Not Found., Invalid media".into(),
            status_code: Some(404),
        };
        assert_eq!(err.to_string(), "API error (404): Not Found., Invalid media");
        assert!(err.is_not_found());

        let err = RemoteError::Api {
            message: "boom".into(),
            status_code: None,
        };
        assert_eq!(err.to_string(), "API error: boom");
    }
}
