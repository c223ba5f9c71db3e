//! # Sync Configuration
//!
//! Configuration for the remote client, retry policy, and sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     REEL_ENDPOINT=https://graphql.anilist.co                           │
//! │     REEL_POLL_INTERVAL_SECS=30                                         │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/reel/reel.toml (Linux)                                   │
//! │     ~/Library/Application Support/com.reel.reel/reel.toml (macOS)      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [remote]
//! endpoint = "https://graphql.anilist.co"
//! request_timeout_secs = 30
//!
//! [retry]
//! max_rate_limit_retries = 3
//! base_delay_ms = 1000
//! multiplier = 2.0
//! max_delay_secs = 60
//!
//! [sync]
//! max_queue_attempts = 3
//! poll_interval_secs = 60
//! pull_interval_secs = 900
//! page_size = 50
//!
//! [database]
//! path = "/home/me/.local/share/reel/reel.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

/// Largest page the remote list endpoint serves.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Upper bound for the poll and pull intervals (30 days).
pub const MAX_INTERVAL_SECS: u64 = 30 * 24 * 60 * 60;

// =============================================================================
// Remote Settings
// =============================================================================

/// Where and how the remote list service is reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// GraphQL endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Per-request timeout (seconds). A timeout surfaces as a network error.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://graphql.anilist.co".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            endpoint: default_endpoint(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Retry Settings
// =============================================================================

/// Rate-limit backoff.
///
/// ```text
/// attempt 1 ── 429 ──► wait base_delay
/// attempt 2 ── 429 ──► wait base_delay × multiplier
/// attempt 3 ── 429 ──► wait base_delay × multiplier²   (capped at max_delay)
/// attempt 4 ── 429 ──► RateLimitExceeded
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries after the first rate-limited attempt.
    #[serde(default = "default_max_rate_limit_retries")]
    pub max_rate_limit_retries: u32,

    /// First backoff delay (milliseconds).
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Growth factor between consecutive delays.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound for any single delay, including `Retry-After` (seconds).
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,
}

fn default_max_rate_limit_retries() -> u32 {
    reel_core::MAX_RATE_LIMIT_RETRIES
}

fn default_base_delay() -> u64 {
    1000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay() -> u64 {
    60
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_rate_limit_retries: default_max_rate_limit_retries(),
            base_delay_ms: default_base_delay(),
            multiplier: default_multiplier(),
            max_delay_secs: default_max_delay(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Queue drain and pull behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Failed attempts after which a queued operation is reported as exhausted.
    #[serde(default = "default_max_queue_attempts")]
    pub max_queue_attempts: u32,

    /// Interval between scheduled drains (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Age after which the scheduler pulls remote changes (seconds).
    #[serde(default = "default_pull_interval")]
    pub pull_interval_secs: u64,

    /// Entries requested per page during incremental pulls.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_max_queue_attempts() -> u32 {
    reel_core::MAX_QUEUE_ATTEMPTS
}

fn default_poll_interval() -> u64 {
    60
}

fn default_pull_interval() -> u64 {
    900
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            max_queue_attempts: default_max_queue_attempts(),
            poll_interval_secs: default_poll_interval(),
            pull_interval_secs: default_pull_interval(),
            page_size: default_page_size(),
        }
    }
}

impl SyncSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Pull staleness threshold, in the units `SyncCursor::is_stale` expects.
    ///
    /// Saturates instead of overflowing for values `validate` would reject.
    pub fn pull_interval(&self) -> chrono::Duration {
        i64::try_from(self.pull_interval_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete Reel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReelConfig {
    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl ReelConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (reel.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        let endpoint = url::Url::parse(&self.remote.endpoint)?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(SyncError::InvalidUrl(format!(
                "Endpoint must use http:// or https://, got: {}",
                self.remote.endpoint
            )));
        }

        if self.remote.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.retry.multiplier < 1.0 {
            return Err(SyncError::InvalidConfig(
                "multiplier must be at least 1.0".into(),
            ));
        }

        if self.retry.base_delay_ms > self.retry.max_delay_secs.saturating_mul(1000) {
            return Err(SyncError::InvalidConfig(
                "base_delay_ms must not exceed max_delay_secs".into(),
            ));
        }

        if self.sync.max_queue_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "max_queue_attempts must be greater than 0".into(),
            ));
        }

        if self.sync.poll_interval_secs == 0 || self.sync.poll_interval_secs > MAX_INTERVAL_SECS {
            return Err(SyncError::InvalidConfig(format!(
                "poll_interval_secs must be between 1 and {MAX_INTERVAL_SECS}"
            )));
        }

        if self.sync.pull_interval_secs > MAX_INTERVAL_SECS {
            return Err(SyncError::InvalidConfig(format!(
                "pull_interval_secs must not exceed {MAX_INTERVAL_SECS}"
            )));
        }

        if self.sync.page_size == 0 || self.sync.page_size > MAX_PAGE_SIZE {
            return Err(SyncError::InvalidConfig(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var("REEL_ENDPOINT") {
            debug!(endpoint = %endpoint, "Overriding endpoint from environment");
            self.remote.endpoint = endpoint;
        }

        if let Some(secs) = env_parse::<u64>("REEL_REQUEST_TIMEOUT_SECS") {
            self.remote.request_timeout_secs = secs;
        }

        if let Some(retries) = env_parse::<u32>("REEL_MAX_RATE_LIMIT_RETRIES") {
            debug!(retries, "Overriding rate-limit retries from environment");
            self.retry.max_rate_limit_retries = retries;
        }

        if let Some(secs) = env_parse::<u64>("REEL_POLL_INTERVAL_SECS") {
            self.sync.poll_interval_secs = secs;
        }

        if let Some(secs) = env_parse::<u64>("REEL_PULL_INTERVAL_SECS") {
            self.sync.pull_interval_secs = secs;
        }

        if let Ok(path) = std::env::var("REEL_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "reel", "reel")
            .map(|dirs| dirs.config_dir().join("reel.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the configured database path, or the platform default.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database.path.clone().or_else(|| {
            directories::ProjectDirs::from("com", "reel", "reel")
                .map(|dirs| dirs.data_dir().join("reel.db"))
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.request_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReelConfig::default();
        assert_eq!(config.remote.endpoint, "https://graphql.anilist.co");
        assert_eq!(config.retry.max_rate_limit_retries, 3);
        assert_eq!(config.sync.max_queue_attempts, 3);
        assert_eq!(config.sync.page_size, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ReelConfig::default();

        config.remote.endpoint = "not a url".into();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.remote.endpoint = "ftp://example.com/graphql".into();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.remote.endpoint = "http://localhost:4000/graphql".into();
        assert!(config.validate().is_ok());

        config.sync.page_size = 51;
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));

        config.sync.page_size = 25;
        config.retry.multiplier = 0.5;
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn test_oversized_pull_interval_is_rejected_and_saturates() {
        let mut config = ReelConfig::default();
        config.sync.pull_interval_secs = u64::MAX;
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));
        assert_eq!(config.sync.pull_interval(), chrono::Duration::MAX);

        config.sync.pull_interval_secs = i64::MAX as u64;
        assert_eq!(config.sync.pull_interval(), chrono::Duration::MAX);

        config.sync.pull_interval_secs = MAX_INTERVAL_SECS;
        assert!(config.validate().is_ok());
        assert_eq!(config.sync.pull_interval(), chrono::Duration::days(30));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ReelConfig = toml::from_str(
            r#"
            [retry]
            max_rate_limit_retries = 5

            [sync]
            poll_interval_secs = 15
            "#,
        )
        .unwrap();

        assert_eq!(config.retry.max_rate_limit_retries, 5);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.sync.poll_interval(), Duration::from_secs(15));
        assert_eq!(config.sync.pull_interval(), chrono::Duration::seconds(900));
        assert_eq!(config.remote.endpoint, "https://graphql.anilist.co");
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join(format!("reel-config-{}", uuid::Uuid::new_v4()))
            .join("reel.toml");

        let mut config = ReelConfig::default();
        config.sync.pull_interval_secs = 120;
        config.database.path = Some(PathBuf::from("/tmp/reel-test.db"));
        config.save(Some(path.clone())).unwrap();

        let loaded = ReelConfig::load(Some(path.clone())).unwrap();
        assert_eq!(loaded.sync.pull_interval_secs, 120);
        assert_eq!(loaded.database_path(), Some(PathBuf::from("/tmp/reel-test.db")));

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_toml_serialization() {
        let config = ReelConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[remote]"));
        assert!(toml_str.contains("[retry]"));
        assert!(toml_str.contains("[sync]"));
    }
}
