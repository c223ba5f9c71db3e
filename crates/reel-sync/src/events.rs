//! # Sync Events
//!
//! Status, progress and error notifications for the UI layer.
//!
//! ```text
//! SyncEngine ──emit_*──► SyncEventEmitter
//!                          ├─ NoOpEmitter     (tests, headless use)
//!                          └─ ChannelEmitter  ──broadcast──► subscribers
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// What the engine is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Idle,
    Draining,
    Pulling,
}

/// Snapshot of sync status for external queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncStatus {
    pub state: SyncState,

    /// Queued operations not yet applied remotely.
    pub pending_count: i64,

    /// End of the last successful pull.
    pub last_synced_at: Option<DateTime<Utc>>,

    /// Last error message (if any).
    pub last_error: Option<String>,
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives engine notifications.
pub trait SyncEventEmitter: Send + Sync {
    /// Emits a sync status change event.
    fn emit_status(&self, status: &SyncStatus);

    /// Emits drain progress: items still queued and items applied so far.
    fn emit_progress(&self, pending: i64, applied: i64);

    /// Emits a sync error event.
    fn emit_error(&self, message: &str, retryable: bool);
}

/// Discards every event.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &SyncStatus) {}
    fn emit_progress(&self, _pending: i64, _applied: i64) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// Broadcast Emitter
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    Status(SyncStatus),
    Progress { pending: i64, applied: i64 },
    Error { message: String, retryable: bool },
}

/// Fans events out over a `tokio::sync::broadcast` channel.
///
/// Slow subscribers lag and lose the oldest events; the engine never blocks.
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    tx: broadcast::Sender<SyncEvent>,
}

impl ChannelEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        ChannelEmitter { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    fn send(&self, event: SyncEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }
}

impl Default for ChannelEmitter {
    fn default() -> Self {
        Self::new(64)
    }
}

impl SyncEventEmitter for ChannelEmitter {
    fn emit_status(&self, status: &SyncStatus) {
        self.send(SyncEvent::Status(status.clone()));
    }

    fn emit_progress(&self, pending: i64, applied: i64) {
        self.send(SyncEvent::Progress { pending, applied });
    }

    fn emit_error(&self, message: &str, retryable: bool) {
        self.send(SyncEvent::Error {
            message: message.to_string(),
            retryable,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_emitter_delivers_in_order() {
        let emitter = ChannelEmitter::new(8);
        let mut rx = emitter.subscribe();

        emitter.emit_status(&SyncStatus {
            state: SyncState::Draining,
            pending_count: 2,
            ..Default::default()
        });
        emitter.emit_progress(1, 1);
        emitter.emit_error("offline", true);

        assert!(matches!(
            rx.recv().await.unwrap(),
            SyncEvent::Status(SyncStatus { state: SyncState::Draining, pending_count: 2, .. })
        ));
        assert_eq!(rx.recv().await.unwrap(), SyncEvent::Progress { pending: 1, applied: 1 });
        assert_eq!(
            rx.recv().await.unwrap(),
            SyncEvent::Error { message: "offline".into(), retryable: true }
        );
    }

    #[test]
    fn test_emit_without_subscribers() {
        let emitter = ChannelEmitter::default();
        emitter.emit_progress(0, 0);
    }
}
