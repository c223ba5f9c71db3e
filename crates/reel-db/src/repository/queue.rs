//! # Operation Queue Repository
//!
//! Durable FIFO of remote-bound mutations for offline-first sync.
//!
//! ## The Queue Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Queue Item Lifecycle                                 │
//! │                                                                         │
//! │  LOCAL MUTATION (e.g., update_progress)                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  enqueue() → INSERT INTO queued_operations   (Pending, attempts = 0)   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            SYNC ENGINE DRAIN (one item in flight)               │   │
//! │  │                                                                 │   │
//! │  │  pending() ORDER BY created_at, rowid                           │   │
//! │  │                                                                 │   │
//! │  │  success → complete()  ┌──── SINGLE TRANSACTION ────┐          │   │
//! │  │                        │ DELETE queued operation    │          │   │
//! │  │                        │ UPDATE entry remote_id     │          │   │
//! │  │                        │ clear dirty if settled     │          │   │
//! │  │                        └────────────────────────────┘          │   │
//! │  │                                                                 │   │
//! │  │  failure → record_failure()  attempts += 1, last_error = ?     │   │
//! │  │            (item stays Pending; never dropped)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::library::{mark_clean_if_settled_in, set_remote_id_in};
use crate::error::{DbError, DbResult};
use reel_core::{NewOperation, OperationKind, QueuedOperation};

/// Repository for queued remote operations.
#[derive(Debug, Clone)]
pub struct OperationQueueRepository {
    pool: SqlitePool,
}

impl OperationQueueRepository {
    /// Creates a new OperationQueueRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OperationQueueRepository { pool }
    }

    /// Appends an operation to the queue.
    ///
    /// ## Example
    /// ```rust,ignore
    /// repo.enqueue(&NewOperation::progress(entry.media_id, 12)).await?;
    /// ```
    pub async fn enqueue(&self, op: &NewOperation) -> DbResult<QueuedOperation> {
        let mut conn = self.pool.acquire().await?;
        enqueue_in(&mut conn, op).await
    }

    /// Every queued operation, oldest first.
    ///
    /// Ties on `created_at` fall back to insertion order.
    pub async fn pending(&self) -> DbResult<Vec<QueuedOperation>> {
        let ops = sqlx::query_as::<_, QueuedOperation>(
            r#"
            SELECT id, kind, media_id, payload,
                   attempts, last_error, created_at, attempted_at
            FROM queued_operations
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ops)
    }

    /// Gets a queued operation by id.
    pub async fn get(&self, id: &str) -> DbResult<Option<QueuedOperation>> {
        let op = sqlx::query_as::<_, QueuedOperation>(
            r#"
            SELECT id, kind, media_id, payload,
                   attempts, last_error, created_at, attempted_at
            FROM queued_operations
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(op)
    }

    /// Records a failed attempt. The operation stays queued.
    pub async fn record_failure(&self, id: &str, error: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE queued_operations SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("QueuedOperation", id));
        }
        Ok(())
    }

    /// Finishes a confirmed operation in one transaction: removes it,
    /// records the remote entry id when known, and clears the entry's
    /// dirty flag if nothing else is queued for that media item.
    ///
    /// Returns true if the dirty flag was cleared.
    pub async fn complete(&self, op: &QueuedOperation, remote_id: Option<i64>) -> DbResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        sqlx::query("DELETE FROM queued_operations WHERE id = ?1")
            .bind(&op.id)
            .execute(&mut *tx)
            .await?;

        if let Some(remote_id) = remote_id {
            set_remote_id_in(&mut tx, op.media_id, remote_id).await?;
        }

        let cleared = mark_clean_if_settled_in(&mut tx, op.media_id).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(id = %op.id, media_id = op.media_id, cleared, "Completed operation");
        Ok(cleared)
    }

    /// Removes an operation without touching library state.
    pub async fn remove(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM queued_operations WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Counts queued operations.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queued_operations")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// True if any operation is queued for the media item.
    pub async fn has_pending_for_media(&self, media_id: i64) -> DbResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM queued_operations WHERE media_id = ?1)",
        )
        .bind(media_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Operations that have used up their attempt budget but stay queued.
    pub async fn exhausted(&self, max_attempts: u32) -> DbResult<Vec<QueuedOperation>> {
        let ops = sqlx::query_as::<_, QueuedOperation>(
            r#"
            SELECT id, kind, media_id, payload,
                   attempts, last_error, created_at, attempted_at
            FROM queued_operations
            WHERE attempts >= ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(max_attempts)
        .fetch_all(&self.pool)
        .await?;

        Ok(ops)
    }
}

// =============================================================================
// Connection-level helpers
// =============================================================================

/// Inserts a queued operation on `conn`, which may be an open transaction.
pub(crate) async fn enqueue_in(
    conn: &mut SqliteConnection,
    op: &NewOperation,
) -> DbResult<QueuedOperation> {
    let queued = QueuedOperation {
        id: Uuid::new_v4().to_string(),
        kind: op.kind(),
        media_id: op.media_id,
        payload: serde_json::to_string(&op.payload)?,
        attempts: 0,
        last_error: None,
        created_at: Utc::now(),
        attempted_at: None,
    };

    debug!(
        id = %queued.id,
        kind = %queued.kind,
        media_id = queued.media_id,
        "Queuing operation"
    );

    sqlx::query(
        r#"
        INSERT INTO queued_operations (
            id, kind, media_id, payload,
            attempts, last_error, created_at, attempted_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&queued.id)
    .bind(queued.kind)
    .bind(queued.media_id)
    .bind(&queued.payload)
    .bind(queued.attempts)
    .bind(&queued.last_error)
    .bind(queued.created_at)
    .bind(queued.attempted_at)
    .execute(&mut *conn)
    .await?;

    Ok(queued)
}

/// True if a delete for the media item is still waiting to reach the remote.
pub(crate) async fn has_pending_delete_in(
    conn: &mut SqliteConnection,
    media_id: i64,
) -> DbResult<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM queued_operations WHERE media_id = ?1 AND kind = ?2)",
    )
    .bind(media_id)
    .bind(OperationKind::DeleteEntry)
    .fetch_one(&mut *conn)
    .await?;

    Ok(exists)
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};
    use reel_core::{
        EntryStatus, MediaItem, NewOperation, OperationKind, OperationPayload, MAX_QUEUE_ATTEMPTS,
    };

    fn media(id: i64) -> MediaItem {
        MediaItem {
            id,
            title_romaji: format!("Show {id}"),
            title_english: None,
            title_native: None,
            cover_image_large: None,
            cover_image_medium: None,
            episodes: None,
            format: None,
            genres: vec![],
            synopsis: None,
            site_url: None,
            updated_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_pending_is_fifo() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let queue = db.queue();

        let first = queue.enqueue(&NewOperation::progress(1, 3)).await.unwrap();
        let second = queue
            .enqueue(&NewOperation::status(2, EntryStatus::Completed))
            .await
            .unwrap();
        let third = queue.enqueue(&NewOperation::delete(3, Some(77))).await.unwrap();

        let pending = queue.pending().await.unwrap();
        let ids: Vec<&str> = pending.iter().map(|op| op.id.as_str()).collect();
        assert_eq!(ids, vec![first.id.as_str(), second.id.as_str(), third.id.as_str()]);

        assert_eq!(pending[1].kind, OperationKind::UpdateStatus);
        assert_eq!(
            pending[2].decode_payload().unwrap(),
            OperationPayload::Delete { remote_id: Some(77) }
        );
    }

    #[tokio::test]
    async fn test_record_failure_keeps_item() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let queue = db.queue();
        let op = queue.enqueue(&NewOperation::progress(1, 3)).await.unwrap();

        for _ in 0..MAX_QUEUE_ATTEMPTS {
            queue.record_failure(&op.id, "offline").await.unwrap();
        }

        let stored = queue.get(&op.id).await.unwrap().unwrap();
        assert_eq!(stored.attempts, MAX_QUEUE_ATTEMPTS);
        assert_eq!(stored.last_error.as_deref(), Some("offline"));
        assert!(stored.attempted_at.is_some());
        assert_eq!(queue.exhausted(MAX_QUEUE_ATTEMPTS).await.unwrap().len(), 1);
        assert_eq!(queue.count_pending().await.unwrap(), 1);

        assert!(queue.record_failure("missing", "x").await.is_err());
    }

    #[tokio::test]
    async fn test_complete_clears_dirty_only_when_settled() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let queue = db.queue();
        db.library()
            .add(&media(1), EntryStatus::Watching, 0, None)
            .await
            .unwrap();

        let status = queue
            .enqueue(&NewOperation::status(1, EntryStatus::Watching))
            .await
            .unwrap();
        let progress = queue.enqueue(&NewOperation::progress(1, 2)).await.unwrap();

        assert!(!queue.complete(&status, Some(501)).await.unwrap());
        let entry = db.library().get_by_media(1).await.unwrap().unwrap();
        assert!(entry.dirty);
        assert_eq!(entry.remote_id, Some(501));
        assert!(queue.has_pending_for_media(1).await.unwrap());

        assert!(queue.complete(&progress, None).await.unwrap());
        let entry = db.library().get_by_media(1).await.unwrap().unwrap();
        assert!(!entry.dirty);
        assert_eq!(entry.remote_id, Some(501));
        assert_eq!(queue.count_pending().await.unwrap(), 0);
    }
}
