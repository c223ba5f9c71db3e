//! # Tracker
//!
//! The entry point the UI layer calls. Every mutation and the operations
//! mirroring it are written in one transaction, then the scheduler is
//! nudged. If queueing fails the local edit is rolled back with it.
//!
//! ```text
//! ┌──────────────────────┬──────────────────────────────────────────────┐
//! │ Tracker call         │ Queued operations                            │
//! ├──────────────────────┼──────────────────────────────────────────────┤
//! │ add                  │ update_status (+ progress if > 0)            │
//! │                      │               (+ score if set)               │
//! │ update_progress      │ update_progress                              │
//! │ update_status        │ update_status                                │
//! │ update_score         │ update_score                                 │
//! │ move_between_lists   │ update_status                                │
//! │ reorder              │ (none; ordering is local only)               │
//! │ delete               │ delete_entry with the known remote id        │
//! └──────────────────────┴──────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use reel_core::{EntryStatus, LibraryEntry, MediaItem, NewOperation, Score};
use reel_db::{Database, LibraryStore, LocalChange};
use tracing::debug;

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::scheduler::SchedulerHandle;

/// Library facade pairing local mutations with queued remote writes.
#[derive(Clone)]
pub struct Tracker {
    db: Arc<Database>,
    engine: Arc<SyncEngine>,
    scheduler: Option<SchedulerHandle>,
}

impl Tracker {
    pub fn new(db: Arc<Database>, engine: Arc<SyncEngine>) -> Self {
        Tracker {
            db,
            engine,
            scheduler: None,
        }
    }

    /// Nudges `scheduler` after every queued mutation.
    pub fn with_scheduler(mut self, scheduler: SchedulerHandle) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Read access to the library.
    pub fn library(&self) -> LibraryStore {
        self.db.library()
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    pub async fn add(
        &self,
        media: &MediaItem,
        status: EntryStatus,
        progress: u32,
        score: Option<Score>,
    ) -> SyncResult<LibraryEntry> {
        let mut change = self.db.library().begin_change().await?;
        let entry = change.add(media, status, progress, score).await?;

        mirror(&mut change, NewOperation::status(entry.media_id, entry.status)).await?;
        if entry.progress > 0 {
            mirror(&mut change, NewOperation::progress(entry.media_id, entry.progress)).await?;
        }
        if entry.score.is_some() {
            mirror(&mut change, NewOperation::score(entry.media_id, entry.score)).await?;
        }

        change.commit().await?;
        self.nudge();
        Ok(entry)
    }

    pub async fn update_progress(&self, id: &str, progress: u32) -> SyncResult<LibraryEntry> {
        let mut change = self.db.library().begin_change().await?;
        let entry = change.update_progress(id, progress).await?;
        mirror(&mut change, NewOperation::progress(entry.media_id, entry.progress)).await?;
        change.commit().await?;
        self.nudge();
        Ok(entry)
    }

    pub async fn update_status(&self, id: &str, status: EntryStatus) -> SyncResult<LibraryEntry> {
        let mut change = self.db.library().begin_change().await?;
        let entry = change.update_status(id, status).await?;
        mirror(&mut change, NewOperation::status(entry.media_id, entry.status)).await?;
        change.commit().await?;
        self.nudge();
        Ok(entry)
    }

    pub async fn update_score(&self, id: &str, score: Option<Score>) -> SyncResult<LibraryEntry> {
        let mut change = self.db.library().begin_change().await?;
        let entry = change.update_score(id, score).await?;
        mirror(&mut change, NewOperation::score(entry.media_id, entry.score)).await?;
        change.commit().await?;
        self.nudge();
        Ok(entry)
    }

    pub async fn move_between_lists(
        &self,
        id: &str,
        to_status: EntryStatus,
    ) -> SyncResult<LibraryEntry> {
        let mut change = self.db.library().begin_change().await?;
        let entry = change.move_between_lists(id, to_status).await?;
        mirror(&mut change, NewOperation::status(entry.media_id, entry.status)).await?;
        change.commit().await?;
        self.nudge();
        Ok(entry)
    }

    /// Reorders within one list. Nothing is sent to the remote.
    pub async fn reorder(
        &self,
        status: EntryStatus,
        from: usize,
        to: usize,
    ) -> SyncResult<Vec<LibraryEntry>> {
        Ok(self.db.library().reorder(status, from, to).await?)
    }

    /// Removes the entry locally and queues the remote delete.
    pub async fn delete(&self, id: &str) -> SyncResult<LibraryEntry> {
        let mut change = self.db.library().begin_change().await?;
        let removed = change.delete(id).await?;
        mirror(&mut change, NewOperation::delete(removed.media_id, removed.remote_id)).await?;
        change.commit().await?;
        self.nudge();
        Ok(removed)
    }

    fn nudge(&self) {
        match &self.scheduler {
            Some(scheduler) => {
                if let Err(e) = scheduler.trigger() {
                    debug!(error = %e, "Queued work waits for the next scheduler start");
                }
            }
            None => debug!("No scheduler attached; queued work waits for the next drain"),
        }
    }
}

/// Queues `op` inside `change`. On failure the caller drops `change`, which
/// rolls back the local edit as well.
async fn mirror(change: &mut LocalChange, op: NewOperation) -> SyncResult<()> {
    change.enqueue(&op).await.map_err(SyncError::QueueWrite)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncSettings;
    use crate::testing;
    use reel_core::{CoreError, OperationKind, OperationPayload};

    async fn tracker() -> (Arc<Database>, Tracker) {
        let (db, _transport, engine) = testing::engine(vec![], SyncSettings::default()).await;
        (db.clone(), Tracker::new(db, engine))
    }

    async fn queued_kinds(db: &Database) -> Vec<OperationKind> {
        db.queue()
            .pending()
            .await
            .unwrap()
            .iter()
            .map(|op| op.kind)
            .collect()
    }

    #[tokio::test]
    async fn test_add_mirrors_status_progress_and_score() {
        let (db, tracker) = tracker().await;
        let score = Score::from_tenths(80).unwrap();

        tracker
            .add(&testing::media(1, Some(26)), EntryStatus::Watching, 4, Some(score))
            .await
            .unwrap();

        assert_eq!(
            queued_kinds(&db).await,
            vec![
                OperationKind::UpdateStatus,
                OperationKind::UpdateProgress,
                OperationKind::UpdateScore
            ]
        );
    }

    #[tokio::test]
    async fn test_add_without_progress_or_score_queues_status_only() {
        let (db, tracker) = tracker().await;
        tracker
            .add(&testing::media(1, None), EntryStatus::PlanToWatch, 0, None)
            .await
            .unwrap();
        assert_eq!(queued_kinds(&db).await, vec![OperationKind::UpdateStatus]);
    }

    #[tokio::test]
    async fn test_duplicate_add_queues_nothing() {
        let (db, tracker) = tracker().await;
        tracker
            .add(&testing::media(1, None), EntryStatus::Watching, 0, None)
            .await
            .unwrap();

        let err = tracker
            .add(&testing::media(1, None), EntryStatus::Completed, 0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Library(CoreError::DuplicateEntry { media_id: 1 })));
        assert_eq!(db.queue().count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_move_queues_status_and_reorder_queues_nothing() {
        let (db, tracker) = tracker().await;
        let a = tracker
            .add(&testing::media(1, None), EntryStatus::Watching, 0, None)
            .await
            .unwrap();
        tracker
            .add(&testing::media(2, None), EntryStatus::Watching, 0, None)
            .await
            .unwrap();
        let before = db.queue().count_pending().await.unwrap();

        tracker.reorder(EntryStatus::Watching, 0, 1).await.unwrap();
        assert_eq!(db.queue().count_pending().await.unwrap(), before);

        let moved = tracker.move_between_lists(&a.id, EntryStatus::Completed).await.unwrap();
        assert_eq!(moved.status, EntryStatus::Completed);

        let last = db.queue().pending().await.unwrap().pop().unwrap();
        assert_eq!(
            last.decode_payload().unwrap(),
            OperationPayload::Status { status: EntryStatus::Completed }
        );
    }

    #[tokio::test]
    async fn test_delete_carries_known_remote_id() {
        let (db, tracker) = tracker().await;
        let entry = tracker
            .add(&testing::media(1, None), EntryStatus::Dropped, 0, None)
            .await
            .unwrap();
        db.library().set_remote_id(1, 4242).await.unwrap();

        let removed = tracker.delete(&entry.id).await.unwrap();
        assert_eq!(removed.remote_id, Some(4242));
        assert!(tracker.library().get(&entry.id).await.unwrap().is_none());

        let last = db.queue().pending().await.unwrap().pop().unwrap();
        assert_eq!(
            last.decode_payload().unwrap(),
            OperationPayload::Delete { remote_id: Some(4242) }
        );
    }

    #[tokio::test]
    async fn test_updates_queue_matching_operations() {
        let (db, tracker) = tracker().await;
        let entry = tracker
            .add(&testing::media(1, Some(12)), EntryStatus::Watching, 0, None)
            .await
            .unwrap();

        tracker.update_progress(&entry.id, 3).await.unwrap();
        tracker.update_status(&entry.id, EntryStatus::OnHold).await.unwrap();
        tracker.update_score(&entry.id, None).await.unwrap();

        assert_eq!(
            queued_kinds(&db).await,
            vec![
                OperationKind::UpdateStatus,
                OperationKind::UpdateProgress,
                OperationKind::UpdateStatus,
                OperationKind::UpdateScore
            ]
        );

        let err = tracker.update_progress("missing", 1).await.unwrap_err();
        assert!(matches!(err, SyncError::Library(CoreError::EntryNotFound(_))));
    }

    #[tokio::test]
    async fn test_edit_racing_a_completed_operation_stays_dirty() {
        let (db, tracker) = tracker().await;
        let entry = tracker
            .add(&testing::media(1, Some(12)), EntryStatus::Watching, 0, None)
            .await
            .unwrap();
        let earlier = db.queue().pending().await.unwrap().remove(0);

        let queue = db.queue();
        let (edited, _cleared) = tokio::join!(
            tracker.update_progress(&entry.id, 3),
            queue.complete(&earlier, Some(900)),
        );
        edited.unwrap();

        // Whichever commits first, the newer edit is queued and stays dirty
        let stored = db.library().get(&entry.id).await.unwrap().unwrap();
        assert!(stored.dirty);
        assert_eq!(stored.progress, 3);
        assert_eq!(stored.remote_id, Some(900));
        assert_eq!(queued_kinds(&db).await, vec![OperationKind::UpdateProgress]);
    }

    #[tokio::test]
    async fn test_failed_enqueue_rolls_back_the_edit() {
        let (db, tracker) = tracker().await;
        let entry = tracker
            .add(&testing::media(1, Some(12)), EntryStatus::Watching, 0, None)
            .await
            .unwrap();

        sqlx::query("DROP TABLE queued_operations")
            .execute(db.pool())
            .await
            .unwrap();

        let err = tracker.update_progress(&entry.id, 5).await.unwrap_err();
        assert!(matches!(err, SyncError::QueueWrite(_)));
        assert_eq!(db.library().get(&entry.id).await.unwrap().unwrap().progress, 0);
    }

    #[tokio::test]
    async fn test_stopped_scheduler_does_not_fail_mutations() {
        let (db, _transport, engine) = testing::engine(vec![], SyncSettings::default()).await;
        let (scheduler, handle) = crate::SyncScheduler::new(engine.clone(), &SyncSettings::default());
        drop(scheduler);

        let tracker = Tracker::new(db.clone(), engine).with_scheduler(handle);
        tracker
            .add(&testing::media(1, None), EntryStatus::Watching, 0, None)
            .await
            .unwrap();
        assert_eq!(db.queue().count_pending().await.unwrap(), 1);
    }
}
