//! # Library Store
//!
//! CRUD and ordering over local library entries. This is the only writer
//! of `sort_position`.
//!
//! ## Mutation Matrix
//! ```text
//! ┌──────────────────────┬────────┬──────────────┬────────────────────────┐
//! │ Operation            │ dirty  │ last_modified│ sort positions         │
//! ├──────────────────────┼────────┼──────────────┼────────────────────────┤
//! │ add                  │ set    │ now          │ append to status       │
//! │ update_progress      │ set    │ now          │ untouched              │
//! │ update_status        │ set    │ now          │ untouched              │
//! │ update_score         │ set    │ now          │ untouched              │
//! │ move_between_lists   │ set    │ now          │ append new, compact old│
//! │ reorder              │ -      │ -            │ renumber status        │
//! │ delete               │ (gone) │ (gone)       │ compact status         │
//! ├──────────────────────┼────────┼──────────────┼────────────────────────┤
//! │ apply_remote         │ clean  │ now          │ append/compact on move │
//! └──────────────────────┴────────┴──────────────┴────────────────────────┘
//! ```
//!
//! The store never talks to the sync engine. A caller that mirrors an edit
//! remotely opens a [`LocalChange`] and enqueues the operation inside it, so
//! the edit and its queued operation commit together.
//!
//! Every mutation runs in a single transaction, so the gap-free invariant
//! holds between any two committed states.

use chrono::Utc;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{media, queue};
use crate::error::{DbError, DbResult};
use reel_core::ordering;
use reel_core::reconcile::{self, ReconcileAction, RemoteEntrySnapshot};
use reel_core::validation::{clamp_progress, validate_progress, validate_score};
use reel_core::{
    CoreError, EntryStatus, LibraryEntry, MediaItem, NewOperation, QueuedOperation, Score,
};

/// Orders `fetch_all` results by status display order.
const STATUS_RANK_SQL: &str = "CASE status \
    WHEN 'watching' THEN 0 \
    WHEN 'completed' THEN 1 \
    WHEN 'plan_to_watch' THEN 2 \
    WHEN 'on_hold' THEN 3 \
    WHEN 'dropped' THEN 4 \
    END";

/// Store for the user's library entries.
#[derive(Debug, Clone)]
pub struct LibraryStore {
    pool: SqlitePool,
}

impl LibraryStore {
    /// Creates a new LibraryStore.
    pub fn new(pool: SqlitePool) -> Self {
        LibraryStore { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets an entry by its local id.
    pub async fn get(&self, id: &str) -> DbResult<Option<LibraryEntry>> {
        let mut conn = self.pool.acquire().await?;
        entry_by_id(&mut conn, id).await
    }

    /// Gets the entry for a media item, if it is in the library.
    pub async fn get_by_media(&self, media_id: i64) -> DbResult<Option<LibraryEntry>> {
        let mut conn = self.pool.acquire().await?;
        entry_by_media(&mut conn, media_id).await
    }

    /// Entries of one status, in sort order.
    pub async fn fetch_by_status(&self, status: EntryStatus) -> DbResult<Vec<LibraryEntry>> {
        let entries = sqlx::query_as::<_, LibraryEntry>(
            r#"
            SELECT id, media_id, remote_id, status, progress, score,
                   sort_position, dirty, last_modified, created_at
            FROM library_entries
            WHERE status = ?1
            ORDER BY sort_position ASC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Every entry, grouped by status display order, then sort order.
    pub async fn fetch_all(&self) -> DbResult<Vec<LibraryEntry>> {
        let sql = format!(
            r#"
            SELECT id, media_id, remote_id, status, progress, score,
                   sort_position, dirty, last_modified, created_at
            FROM library_entries
            ORDER BY {STATUS_RANK_SQL} ASC, sort_position ASC
            "#
        );

        let entries = sqlx::query_as::<_, LibraryEntry>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Number of entries with the given status.
    pub async fn count(&self, status: EntryStatus) -> DbResult<usize> {
        let mut conn = self.pool.acquire().await?;
        count_in(&mut conn, status).await
    }

    // =========================================================================
    // Local mutations
    // =========================================================================

    /// Opens a [`LocalChange`] so library writes and the operations that
    /// mirror them commit together.
    ///
    /// ```rust,ignore
    /// let mut change = db.library().begin_change().await?;
    /// let entry = change.update_progress(&id, 12).await?;
    /// change.enqueue(&NewOperation::progress(entry.media_id, entry.progress)).await?;
    /// change.commit().await?;
    /// ```
    pub async fn begin_change(&self) -> DbResult<LocalChange> {
        Ok(LocalChange {
            tx: self.begin().await?,
        })
    }

    /// Adds a media item to the library at the end of `status`.
    ///
    /// ## Errors
    /// - `DuplicateEntry` if the media item is already in the library
    /// - `Validation` if progress exceeds the episode count or the score is out of range
    pub async fn add(
        &self,
        media: &MediaItem,
        status: EntryStatus,
        progress: u32,
        score: Option<Score>,
    ) -> DbResult<LibraryEntry> {
        let mut change = self.begin_change().await?;
        let entry = change.add(media, status, progress, score).await?;
        change.commit().await?;
        Ok(entry)
    }

    /// Sets watched progress.
    pub async fn update_progress(&self, id: &str, progress: u32) -> DbResult<LibraryEntry> {
        let mut change = self.begin_change().await?;
        let entry = change.update_progress(id, progress).await?;
        change.commit().await?;
        Ok(entry)
    }

    /// Sets the status field only.
    ///
    /// The entry keeps its current `sort_position`; use
    /// [`move_between_lists`](Self::move_between_lists) to reposition.
    pub async fn update_status(&self, id: &str, status: EntryStatus) -> DbResult<LibraryEntry> {
        let mut change = self.begin_change().await?;
        let entry = change.update_status(id, status).await?;
        change.commit().await?;
        Ok(entry)
    }

    /// Sets or clears the score.
    pub async fn update_score(&self, id: &str, score: Option<Score>) -> DbResult<LibraryEntry> {
        let mut change = self.begin_change().await?;
        let entry = change.update_score(id, score).await?;
        change.commit().await?;
        Ok(entry)
    }

    /// Moves an entry to the end of another status list and compacts the
    /// list it left.
    ///
    /// ## Example
    /// ```text
    /// move A → completed
    ///   watching  [X, A, Y] → [X, Y]
    ///   completed [P, Q]    → [P, Q, A]
    /// ```
    pub async fn move_between_lists(
        &self,
        id: &str,
        to_status: EntryStatus,
    ) -> DbResult<LibraryEntry> {
        let mut change = self.begin_change().await?;
        let entry = change.move_between_lists(id, to_status).await?;
        change.commit().await?;
        Ok(entry)
    }

    /// Moves the entry at `from` to `to` within one status list.
    ///
    /// Local-only: there is no remote counterpart, so entries are not
    /// marked dirty. Returns the list in its new order.
    pub async fn reorder(
        &self,
        status: EntryStatus,
        from: usize,
        to: usize,
    ) -> DbResult<Vec<LibraryEntry>> {
        let mut tx = self.begin().await?;

        let current = positions_in(&mut tx, status).await?;
        let reordered = ordering::reorder(&current, status, from, to)?;
        apply_positions_in(&mut tx, &reordered).await?;

        self.commit(tx).await?;

        debug!(status = %status, from, to, "Reordered list");
        self.fetch_by_status(status).await
    }

    /// Removes an entry and compacts its status list.
    ///
    /// Returns the removed entry so the caller can mirror the deletion.
    pub async fn delete(&self, id: &str) -> DbResult<LibraryEntry> {
        let mut change = self.begin_change().await?;
        let entry = change.delete(id).await?;
        change.commit().await?;
        Ok(entry)
    }

    // =========================================================================
    // Reconciliation writes (never set dirty)
    // =========================================================================

    /// Applies one pulled remote entry under last-writer-wins.
    ///
    /// ```text
    /// local missing, delete queued → keep local (stay deleted)
    /// local missing, media unknown → skip
    /// local missing                → insert clean at end of remote status
    /// local clean                  → overwrite fields; on status change append + compact
    /// local dirty                  → keep local (only learn a missing remote id)
    /// ```
    ///
    /// Remote progress is clamped to the cached episode count before it is
    /// compared, so an over-reported value settles to `Unchanged`.
    pub async fn apply_remote(&self, remote: &RemoteEntrySnapshot) -> DbResult<ReconcileAction> {
        let mut tx = self.begin().await?;

        if let Some(media) = &remote.media {
            media::upsert_in(&mut tx, media).await?;
        }

        let local = entry_by_media(&mut tx, remote.media_id).await?;
        let episodes = media::episodes_in(&mut tx, remote.media_id).await?;
        let progress = clamp_progress(remote.progress, episodes);

        let action = if local.is_some() {
            let clamped = RemoteEntrySnapshot {
                progress,
                ..remote.clone()
            };
            reconcile::decide(local.as_ref(), &clamped)
        } else if queue::has_pending_delete_in(&mut tx, remote.media_id).await? {
            ReconcileAction::KeepLocal
        } else if !media::exists_in(&mut tx, remote.media_id).await? {
            warn!(
                media_id = remote.media_id,
                remote_id = remote.remote_id,
                "Remote entry has no catalog data and the media item is not cached, skipping"
            );
            ReconcileAction::Skipped
        } else {
            ReconcileAction::Insert
        };
        let now = Utc::now();

        match (action, local) {
            (ReconcileAction::Insert, _) => {
                let entry = LibraryEntry {
                    id: Uuid::new_v4().to_string(),
                    media_id: remote.media_id,
                    remote_id: Some(remote.remote_id),
                    status: remote.status,
                    progress,
                    score: remote.score,
                    sort_position: ordering::append_position(
                        count_in(&mut tx, remote.status).await?,
                    ),
                    dirty: false,
                    last_modified: now,
                    created_at: now,
                };
                insert_in(&mut tx, &entry).await?;
            }
            (ReconcileAction::Overwrite, Some(local)) => {
                let position = if local.status == remote.status {
                    local.sort_position
                } else {
                    ordering::append_position(count_in(&mut tx, remote.status).await?)
                };

                sqlx::query(
                    r#"
                    UPDATE library_entries
                    SET remote_id = ?2, status = ?3, progress = ?4, score = ?5,
                        sort_position = ?6, dirty = 0, last_modified = ?7
                    WHERE id = ?1
                    "#,
                )
                .bind(&local.id)
                .bind(remote.remote_id)
                .bind(remote.status)
                .bind(progress)
                .bind(remote.score)
                .bind(position)
                .bind(now)
                .execute(&mut *tx)
                .await?;

                if local.status != remote.status {
                    compact_in(&mut tx, local.status).await?;
                }
            }
            (ReconcileAction::KeepLocal, Some(local)) if local.remote_id.is_none() => {
                set_remote_id_in(&mut tx, local.media_id, remote.remote_id).await?;
            }
            _ => {}
        }

        self.commit(tx).await?;

        debug!(media_id = remote.media_id, action = ?action, "Applied remote entry");
        Ok(action)
    }

    /// Clears `dirty` for a media item when no queued operation remains for it.
    ///
    /// Returns true if the flag was cleared.
    pub async fn mark_clean_if_settled(&self, media_id: i64) -> DbResult<bool> {
        let mut conn = self.pool.acquire().await?;
        mark_clean_if_settled_in(&mut conn, media_id).await
    }

    /// Records the remote list-entry id learned from a save or pull.
    pub async fn set_remote_id(&self, media_id: i64, remote_id: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        set_remote_id_in(&mut conn, media_id, remote_id).await
    }

    // =========================================================================
    // Transaction helpers
    // =========================================================================

    async fn begin(&self) -> DbResult<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }

    async fn commit(&self, tx: Transaction<'static, Sqlite>) -> DbResult<()> {
        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }
}

// =============================================================================
// Local Change
// =============================================================================

/// An open transaction over local edits and their queued operations.
///
/// ```text
/// ┌──────────── SINGLE TRANSACTION ────────────┐
/// │ UPDATE library_entries  (dirty = 1)        │
/// │ INSERT INTO queued_operations  (mirror)    │
/// └────────────────────────────────────────────┘
/// ```
///
/// A drain finishing an older operation for the same media item sees either
/// neither write or both, so it can never clear `dirty` for an edit whose
/// operation is not queued yet. Dropping the change without
/// [`commit`](Self::commit) rolls everything back.
pub struct LocalChange {
    tx: Transaction<'static, Sqlite>,
}

impl LocalChange {
    /// See [`LibraryStore::add`].
    pub async fn add(
        &mut self,
        media: &MediaItem,
        status: EntryStatus,
        progress: u32,
        score: Option<Score>,
    ) -> DbResult<LibraryEntry> {
        validate_progress(progress, media.episodes).map_err(CoreError::from)?;
        validate_score(score).map_err(CoreError::from)?;

        if entry_by_media(&mut self.tx, media.id).await?.is_some() {
            return Err(CoreError::DuplicateEntry { media_id: media.id }.into());
        }

        media::upsert_in(&mut self.tx, media).await?;

        let now = Utc::now();
        let entry = LibraryEntry {
            id: Uuid::new_v4().to_string(),
            media_id: media.id,
            remote_id: None,
            status,
            progress,
            score,
            sort_position: ordering::append_position(count_in(&mut self.tx, status).await?),
            dirty: true,
            last_modified: now,
            created_at: now,
        };

        insert_in(&mut self.tx, &entry).await?;

        info!(
            id = %entry.id,
            media_id = entry.media_id,
            status = %entry.status,
            position = entry.sort_position,
            "Added library entry"
        );

        Ok(entry)
    }

    pub async fn update_progress(&mut self, id: &str, progress: u32) -> DbResult<LibraryEntry> {
        let entry = require_entry(&mut self.tx, id).await?;

        let episodes = media::episodes_in(&mut self.tx, entry.media_id).await?;
        validate_progress(progress, episodes).map_err(CoreError::from)?;

        sqlx::query(
            r#"
            UPDATE library_entries
            SET progress = ?2, dirty = 1, last_modified = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(progress)
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await?;

        debug!(id = %id, progress, "Updated progress");
        require_entry(&mut self.tx, id).await
    }

    pub async fn update_status(&mut self, id: &str, status: EntryStatus) -> DbResult<LibraryEntry> {
        require_entry(&mut self.tx, id).await?;

        sqlx::query(
            r#"
            UPDATE library_entries
            SET status = ?2, dirty = 1, last_modified = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await?;

        debug!(id = %id, status = %status, "Updated status");
        require_entry(&mut self.tx, id).await
    }

    pub async fn update_score(&mut self, id: &str, score: Option<Score>) -> DbResult<LibraryEntry> {
        validate_score(score).map_err(CoreError::from)?;
        require_entry(&mut self.tx, id).await?;

        sqlx::query(
            r#"
            UPDATE library_entries
            SET score = ?2, dirty = 1, last_modified = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(score)
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await?;

        debug!(id = %id, score = ?score, "Updated score");
        require_entry(&mut self.tx, id).await
    }

    /// See [`LibraryStore::move_between_lists`].
    pub async fn move_between_lists(
        &mut self,
        id: &str,
        to_status: EntryStatus,
    ) -> DbResult<LibraryEntry> {
        let entry = require_entry(&mut self.tx, id).await?;
        let now = Utc::now();

        if entry.status == to_status {
            sqlx::query("UPDATE library_entries SET dirty = 1, last_modified = ?2 WHERE id = ?1")
                .bind(id)
                .bind(now)
                .execute(&mut *self.tx)
                .await?;
        } else {
            let position = ordering::append_position(count_in(&mut self.tx, to_status).await?);

            sqlx::query(
                r#"
                UPDATE library_entries
                SET status = ?2, sort_position = ?3, dirty = 1, last_modified = ?4
                WHERE id = ?1
                "#,
            )
            .bind(id)
            .bind(to_status)
            .bind(position)
            .bind(now)
            .execute(&mut *self.tx)
            .await?;

            compact_in(&mut self.tx, entry.status).await?;
        }

        let updated = require_entry(&mut self.tx, id).await?;

        info!(
            id = %id,
            from = %entry.status,
            to = %to_status,
            position = updated.sort_position,
            "Moved library entry"
        );
        Ok(updated)
    }

    /// Removes an entry and compacts its status list.
    pub async fn delete(&mut self, id: &str) -> DbResult<LibraryEntry> {
        let entry = require_entry(&mut self.tx, id).await?;

        sqlx::query("DELETE FROM library_entries WHERE id = ?1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        compact_in(&mut self.tx, entry.status).await?;

        info!(id = %id, media_id = entry.media_id, "Deleted library entry");
        Ok(entry)
    }

    /// Queues a remote operation as part of this change.
    pub async fn enqueue(&mut self, op: &NewOperation) -> DbResult<QueuedOperation> {
        queue::enqueue_in(&mut self.tx, op).await
    }

    pub async fn commit(self) -> DbResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }
}

// =============================================================================
// Connection-level helpers
// =============================================================================

async fn entry_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<LibraryEntry>> {
    let entry = sqlx::query_as::<_, LibraryEntry>(
        r#"
        SELECT id, media_id, remote_id, status, progress, score,
               sort_position, dirty, last_modified, created_at
        FROM library_entries
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(entry)
}

async fn require_entry(conn: &mut SqliteConnection, id: &str) -> DbResult<LibraryEntry> {
    entry_by_id(conn, id)
        .await?
        .ok_or_else(|| CoreError::EntryNotFound(id.to_string()).into())
}

async fn entry_by_media(
    conn: &mut SqliteConnection,
    media_id: i64,
) -> DbResult<Option<LibraryEntry>> {
    let entry = sqlx::query_as::<_, LibraryEntry>(
        r#"
        SELECT id, media_id, remote_id, status, progress, score,
               sort_position, dirty, last_modified, created_at
        FROM library_entries
        WHERE media_id = ?1
        "#,
    )
    .bind(media_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(entry)
}

async fn insert_in(conn: &mut SqliteConnection, entry: &LibraryEntry) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO library_entries (
            id, media_id, remote_id, status, progress, score,
            sort_position, dirty, last_modified, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&entry.id)
    .bind(entry.media_id)
    .bind(entry.remote_id)
    .bind(entry.status)
    .bind(entry.progress)
    .bind(entry.score)
    .bind(entry.sort_position)
    .bind(entry.dirty)
    .bind(entry.last_modified)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn count_in(conn: &mut SqliteConnection, status: EntryStatus) -> DbResult<usize> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM library_entries WHERE status = ?1")
        .bind(status)
        .fetch_one(&mut *conn)
        .await?;

    Ok(count as usize)
}

/// `(id, sort_position)` pairs of one status, in current order.
async fn positions_in(
    conn: &mut SqliteConnection,
    status: EntryStatus,
) -> DbResult<Vec<(String, u32)>> {
    let rows = sqlx::query_as::<_, (String, u32)>(
        r#"
        SELECT id, sort_position
        FROM library_entries
        WHERE status = ?1
        ORDER BY sort_position ASC, created_at ASC
        "#,
    )
    .bind(status)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

/// Renumbers rows given in their desired order, writing only changed positions.
async fn apply_positions_in(conn: &mut SqliteConnection, ordered: &[(String, u32)]) -> DbResult<()> {
    for (id, position) in ordering::changed_positions(ordered) {
        sqlx::query("UPDATE library_entries SET sort_position = ?2 WHERE id = ?1")
            .bind(id)
            .bind(position)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Closes any gaps left in a status list by a removal.
async fn compact_in(conn: &mut SqliteConnection, status: EntryStatus) -> DbResult<()> {
    let current = positions_in(conn, status).await?;
    apply_positions_in(conn, &current).await
}

pub(crate) async fn set_remote_id_in(
    conn: &mut SqliteConnection,
    media_id: i64,
    remote_id: i64,
) -> DbResult<()> {
    sqlx::query("UPDATE library_entries SET remote_id = ?2 WHERE media_id = ?1")
        .bind(media_id)
        .bind(remote_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn mark_clean_if_settled_in(
    conn: &mut SqliteConnection,
    media_id: i64,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE library_entries
        SET dirty = 0
        WHERE media_id = ?1
          AND dirty = 1
          AND NOT EXISTS (SELECT 1 FROM queued_operations WHERE media_id = ?1)
        "#,
    )
    .bind(media_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Unit Tests
// =============================================================================
