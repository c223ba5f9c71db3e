//! # Sync Engine
//!
//! Replays queued operations against the remote and pulls remote changes.
//!
//! ## Queue Drain
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         process_queue()                                 │
//! │                                                                         │
//! │  ┌───────────────────────────────────────────────────────────────────┐ │
//! │  │ queued_operations (FIFO: created_at, rowid)                       │ │
//! │  │                                                                   │ │
//! │  │  op-1  update_progress  media 21   attempts 0                     │ │
//! │  │  op-2  update_status    media 21   attempts 2                     │ │
//! │  │  op-3  delete_entry     media 457  attempts 0                     │ │
//! │  └──────────────────────────────┬────────────────────────────────────┘ │
//! │                                 │ one at a time                        │
//! │                                 ▼                                      │
//! │        ┌──────────────── RemoteClient.execute ────────────────┐       │
//! │        ▼ ok                                                   ▼ err   │
//! │  one transaction:                                 attempts += 1       │
//! │   • delete op                                     last_error = err    │
//! │   • record remote id                              keep going          │
//! │   • clear dirty if nothing else queued            (never dropped)     │
//! │                                                                         │
//! │  After the pass: first fatal error, else first transient error.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Pulls
//! ```text
//! sync_user_lists()   pages newest-first, stops at the first entry older
//!                     than the cursor
//! sync_all()          whole collection in one request
//!
//! each remote entry ─► LibraryStore::apply_remote (insert / overwrite / keep local)
//! cursor advances only after the whole pull succeeded
//! ```
//!
//! Both drains and pulls are single-flight. The flag is released when the
//! guard drops, so a cancelled future never wedges the engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use reel_core::{
    NewOperation, OperationPayload, PullMode, QueuedOperation, ReconcileSummary, SyncCursor,
};
use reel_db::Database;

use crate::config::SyncSettings;
use crate::error::{SyncError, SyncResult};
use crate::events::{NoOpEmitter, SyncEventEmitter, SyncState, SyncStatus};
use crate::remote::operations::{
    DeleteListEntry, FindListEntry, SaveListEntry, UserListCollection, UserListPage, Viewer,
    WireListEntry,
};
use crate::remote::RemoteClient;

// =============================================================================
// Reports
// =============================================================================

/// Outcome of one queue drain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Another drain was already running; nothing was attempted.
    pub skipped: bool,
    pub attempted: usize,
    pub applied: usize,
    pub failed: usize,
    /// Ids of operations that reached the attempt limit. They stay queued.
    pub exhausted: Vec<String>,
    /// Operations still queued after the pass.
    pub remaining: i64,
}

impl DrainReport {
    fn skipped() -> Self {
        DrainReport {
            skipped: true,
            ..Default::default()
        }
    }
}

/// Outcome of one pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullReport {
    pub mode: PullMode,
    pub skipped: bool,
    /// Requests made for list data.
    pub pages: u32,
    pub summary: ReconcileSummary,
}

impl PullReport {
    fn new(mode: PullMode) -> Self {
        PullReport {
            mode,
            skipped: false,
            pages: 0,
            summary: ReconcileSummary::default(),
        }
    }

    fn skipped(mode: PullMode) -> Self {
        PullReport {
            skipped: true,
            ..Self::new(mode)
        }
    }
}

// =============================================================================
// Single-flight Guard
// =============================================================================

/// Holds a flag for the duration of a drain or pull.
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// =============================================================================
// Sync Engine
// =============================================================================

/// Drives the operation queue and remote pulls.
pub struct SyncEngine {
    db: Arc<Database>,
    remote: RemoteClient,
    settings: SyncSettings,
    emitter: Arc<dyn SyncEventEmitter>,

    /// Session-scoped; a fresh engine starts with no cursor.
    cursor: RwLock<Option<SyncCursor>>,
    /// Authenticated remote user, resolved on first use.
    viewer_id: RwLock<Option<i64>>,
    status: RwLock<SyncStatus>,
    last_drain: RwLock<Option<DrainReport>>,

    draining: AtomicBool,
    pulling: AtomicBool,
}

impl SyncEngine {
    pub fn new(db: Arc<Database>, remote: RemoteClient, settings: SyncSettings) -> Self {
        Self::with_emitter(db, remote, settings, Arc::new(NoOpEmitter))
    }

    pub fn with_emitter(
        db: Arc<Database>,
        remote: RemoteClient,
        settings: SyncSettings,
        emitter: Arc<dyn SyncEventEmitter>,
    ) -> Self {
        SyncEngine {
            db,
            remote,
            settings,
            emitter,
            cursor: RwLock::new(None),
            viewer_id: RwLock::new(None),
            status: RwLock::new(SyncStatus::default()),
            last_drain: RwLock::new(None),
            draining: AtomicBool::new(false),
            pulling: AtomicBool::new(false),
        }
    }

    // =========================================================================
    // Queue
    // =========================================================================

    /// Durably appends an operation to the queue.
    pub async fn enqueue(&self, op: &NewOperation) -> SyncResult<QueuedOperation> {
        let queued = self
            .db
            .queue()
            .enqueue(op)
            .await
            .map_err(SyncError::QueueWrite)?;

        debug!(id = %queued.id, kind = %queued.kind, media_id = queued.media_id, "Operation queued");
        Ok(queued)
    }

    /// Applies every queued operation once, oldest first.
    ///
    /// Returns the first fatal error, or else the first transient error,
    /// after every item has been attempted. A call made while another drain
    /// is running returns a skipped report immediately.
    pub async fn process_queue(&self) -> SyncResult<DrainReport> {
        let Some(_guard) = FlightGuard::acquire(&self.draining) else {
            debug!("Drain already in progress, skipping");
            return Ok(DrainReport::skipped());
        };

        let result = self.drain().await;
        self.finish(SyncState::Draining, result).await
    }

    async fn drain(&self) -> SyncResult<DrainReport> {
        let ops = self.db.queue().pending().await?;
        if ops.is_empty() {
            debug!("Operation queue is empty");
            return Ok(DrainReport::default());
        }

        let total = ops.len() as i64;
        info!(count = total, "Draining operation queue");
        self.set_state(SyncState::Draining, total).await;

        let mut report = DrainReport::default();
        let mut first_fatal: Option<SyncError> = None;
        let mut first_transient: Option<SyncError> = None;

        for op in ops {
            report.attempted += 1;

            match self.apply(&op).await {
                Ok(remote_id) => {
                    let settled = self.db.queue().complete(&op, remote_id).await?;
                    report.applied += 1;
                    debug!(
                        id = %op.id,
                        kind = %op.kind,
                        media_id = op.media_id,
                        settled,
                        "Operation applied"
                    );
                }
                Err(err) => {
                    self.db.queue().record_failure(&op.id, &err.to_string()).await?;
                    report.failed += 1;

                    let attempts = op.attempts + 1;
                    if attempts >= self.settings.max_queue_attempts {
                        warn!(
                            id = %op.id,
                            kind = %op.kind,
                            media_id = op.media_id,
                            attempts,
                            "Operation reached its attempt limit; keeping it queued"
                        );
                        report.exhausted.push(op.id.clone());
                    }

                    if err.is_retryable() {
                        warn!(id = %op.id, attempts, error = %err, "Operation failed, will retry");
                        first_transient.get_or_insert(err);
                    } else {
                        error!(id = %op.id, attempts, error = %err, "Operation rejected");
                        first_fatal.get_or_insert(err);
                    }
                }
            }

            let applied = report.applied as i64;
            self.emitter.emit_progress(total - applied, applied);
        }

        report.remaining = self.db.queue().count_pending().await?;
        info!(
            applied = report.applied,
            failed = report.failed,
            exhausted = report.exhausted.len(),
            remaining = report.remaining,
            "Drain complete"
        );

        *self.last_drain.write().await = Some(report.clone());

        match first_fatal.or(first_transient) {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    /// Sends one operation. Returns the remote entry id when the remote
    /// reported one.
    async fn apply(&self, op: &QueuedOperation) -> SyncResult<Option<i64>> {
        let save = match op.decode_payload()? {
            OperationPayload::Progress { progress } => SaveListEntry {
                media_id: op.media_id,
                progress: Some(progress),
                ..Default::default()
            },
            OperationPayload::Status { status } => SaveListEntry {
                media_id: op.media_id,
                status: Some(status.into()),
                ..Default::default()
            },
            OperationPayload::Score { score } => SaveListEntry {
                media_id: op.media_id,
                score: Some(score.map_or(0.0, |s| s.as_decimal())),
                ..Default::default()
            },
            OperationPayload::Delete { remote_id } => {
                self.apply_delete(op.media_id, remote_id).await?;
                return Ok(None);
            }
        };

        let data = self.remote.execute(&save).await?;
        Ok(Some(data.saved.id))
    }

    async fn apply_delete(&self, media_id: i64, remote_id: Option<i64>) -> SyncResult<()> {
        let remote_id = match remote_id {
            Some(id) => Some(id),
            None => self.find_remote_id(media_id).await?,
        };

        let Some(remote_id) = remote_id else {
            debug!(media_id, "No remote entry to delete");
            return Ok(());
        };

        match self.remote.execute(&DeleteListEntry { id: remote_id }).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => {
                debug!(media_id, remote_id, "Remote entry already gone");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_remote_id(&self, media_id: i64) -> SyncResult<Option<i64>> {
        let user_id = self.viewer_id().await?;
        match self.remote.execute(&FindListEntry { user_id, media_id }).await {
            Ok(data) => Ok(data.entry.map(|e| e.id)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    // =========================================================================
    // Pulls
    // =========================================================================

    /// Pulls entries changed since the cursor and reconciles them.
    pub async fn sync_user_lists(&self) -> SyncResult<PullReport> {
        let Some(_guard) = FlightGuard::acquire(&self.pulling) else {
            debug!("Pull already in progress, skipping");
            return Ok(PullReport::skipped(PullMode::Incremental));
        };

        let started = Utc::now();
        let since = self.cursor().await.map(|c| c.last_synced_at);
        self.set_state(SyncState::Pulling, self.pending_count().await).await;

        let result = self.pull_incremental(since).await;
        let result = self.advance_cursor(result, started).await;
        self.finish(SyncState::Pulling, result).await
    }

    /// Pulls the complete collection and reconciles it.
    pub async fn sync_all(&self) -> SyncResult<PullReport> {
        let Some(_guard) = FlightGuard::acquire(&self.pulling) else {
            debug!("Pull already in progress, skipping");
            return Ok(PullReport::skipped(PullMode::Full));
        };

        let started = Utc::now();
        self.set_state(SyncState::Pulling, self.pending_count().await).await;

        let result = self.pull_full().await;
        let result = self.advance_cursor(result, started).await;
        self.finish(SyncState::Pulling, result).await
    }

    async fn pull_incremental(&self, since: Option<DateTime<Utc>>) -> SyncResult<PullReport> {
        let user_id = self.viewer_id().await?;
        let mut report = PullReport::new(PullMode::Incremental);
        let mut page = 1;

        info!(?since, "Pulling remote changes");

        loop {
            let data = self
                .remote
                .execute(&UserListPage {
                    user_id,
                    page,
                    per_page: self.settings.page_size,
                })
                .await?;
            report.pages += 1;

            let mut reached_cursor = false;
            for wire in data.page.media_list {
                if since.is_some_and(|since| wire.updated_at() < since) {
                    reached_cursor = true;
                    break;
                }
                self.reconcile(wire, &mut report.summary).await?;
            }

            if reached_cursor || !data.page.page_info.has_next_page {
                break;
            }
            page += 1;
        }

        Ok(report)
    }

    async fn pull_full(&self) -> SyncResult<PullReport> {
        let user_id = self.viewer_id().await?;
        let mut report = PullReport::new(PullMode::Full);

        info!("Pulling full remote collection");

        let data = self.remote.execute(&UserListCollection { user_id }).await?;
        report.pages = 1;

        for wire in data.into_entries() {
            self.reconcile(wire, &mut report.summary).await?;
        }

        Ok(report)
    }

    async fn reconcile(&self, wire: WireListEntry, summary: &mut ReconcileSummary) -> SyncResult<()> {
        let action = self.db.library().apply_remote(&wire.into_snapshot()).await?;
        summary.record(action);
        Ok(())
    }

    /// Moves the cursor to `started` if the pull succeeded.
    async fn advance_cursor(
        &self,
        result: SyncResult<PullReport>,
        started: DateTime<Utc>,
    ) -> SyncResult<PullReport> {
        let report = result?;
        *self.cursor.write().await = Some(SyncCursor {
            last_synced_at: started,
            mode: report.mode,
        });
        self.status.write().await.last_synced_at = Some(started);

        let summary = &report.summary;
        info!(
            mode = ?report.mode,
            pages = report.pages,
            inserted = summary.inserted,
            overwritten = summary.overwritten,
            kept_local = summary.kept_local,
            unchanged = summary.unchanged,
            skipped = summary.skipped,
            "Pull complete"
        );
        Ok(report)
    }

    // =========================================================================
    // Session State
    // =========================================================================

    /// Returns the authenticated user's remote id, asking the remote once.
    pub async fn viewer_id(&self) -> SyncResult<i64> {
        if let Some(id) = *self.viewer_id.read().await {
            return Ok(id);
        }

        let data = self.remote.execute(&Viewer::default()).await?;
        info!(user_id = data.viewer.id, name = %data.viewer.name, "Resolved remote user");
        *self.viewer_id.write().await = Some(data.viewer.id);
        Ok(data.viewer.id)
    }

    pub async fn cursor(&self) -> Option<SyncCursor> {
        *self.cursor.read().await
    }

    /// True if no pull has succeeded yet or the last one is older than the
    /// configured pull interval.
    pub async fn needs_pull(&self, now: DateTime<Utc>) -> bool {
        match self.cursor().await {
            Some(cursor) => cursor.is_stale(now, self.settings.pull_interval()),
            None => true,
        }
    }

    pub async fn status(&self) -> SyncStatus {
        self.status.read().await.clone()
    }

    /// Report of the most recent drain that attempted anything.
    pub async fn last_drain(&self) -> Option<DrainReport> {
        self.last_drain.read().await.clone()
    }

    /// Operations that reached the attempt limit and are still queued.
    pub async fn exhausted_operations(&self) -> SyncResult<Vec<QueuedOperation>> {
        Ok(self
            .db
            .queue()
            .exhausted(self.settings.max_queue_attempts)
            .await?)
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    // =========================================================================
    // Status Helpers
    // =========================================================================

    async fn pending_count(&self) -> i64 {
        self.db.queue().count_pending().await.unwrap_or_default()
    }

    async fn set_state(&self, state: SyncState, pending: i64) {
        let mut status = self.status.write().await;
        status.state = state;
        status.pending_count = pending;
        self.emitter.emit_status(&status);
    }

    /// Returns to idle, records the outcome, and notifies listeners.
    async fn finish<T>(&self, phase: SyncState, result: SyncResult<T>) -> SyncResult<T> {
        let pending = self.pending_count().await;
        let mut status = self.status.write().await;
        status.state = SyncState::Idle;
        status.pending_count = pending;

        match &result {
            Ok(_) => status.last_error = None,
            Err(err) => {
                debug!(phase = ?phase, error = %err, "Sync pass ended with error");
                status.last_error = Some(err.to_string());
                self.emitter.emit_error(&err.user_message(), err.is_retryable());
            }
        }

        self.emitter.emit_status(&status);
        result
    }
}
