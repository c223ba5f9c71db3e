//! # Media Repository
//!
//! Local cache of catalog entries fetched from the remote service.
//!
//! ## Genre Normalization
//! ```text
//! media_items              media_genres             genres
//! ┌────┬──────────┐        ┌──────────┬──────────┐  ┌────┬──────────┐
//! │ id │ title    │        │ media_id │ genre_id │  │ id │ name     │
//! ├────┼──────────┤        ├──────────┼──────────┤  ├────┼──────────┤
//! │ 21 │ One Piece│◄───────│ 21       │ 1        │─►│ 1  │ Action   │
//! │ 457│ Mushishi │◄───┬───│ 21       │ 2        │─►│ 2  │ Adventure│
//! └────┴──────────┘    └───│ 457      │ 3        │─►│ 3  │ Mystery  │
//!                          └──────────┴──────────┘  └────┴──────────┘
//! ```
//! Each genre name is stored once; re-upserting a media item replaces its
//! links but never deletes genre rows.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use reel_core::validation::validate_media;
use reel_core::{CoreError, MediaFormat, MediaItem};

/// Row shape of `media_items`; genres are loaded separately.
#[derive(Debug, sqlx::FromRow)]
struct MediaRow {
    id: i64,
    title_romaji: String,
    title_english: Option<String>,
    title_native: Option<String>,
    cover_image_large: Option<String>,
    cover_image_medium: Option<String>,
    episodes: Option<u32>,
    format: Option<MediaFormat>,
    synopsis: Option<String>,
    site_url: Option<String>,
    updated_at: DateTime<Utc>,
}

impl MediaRow {
    fn into_media(self, genres: Vec<String>) -> MediaItem {
        MediaItem {
            id: self.id,
            title_romaji: self.title_romaji,
            title_english: self.title_english,
            title_native: self.title_native,
            cover_image_large: self.cover_image_large,
            cover_image_medium: self.cover_image_medium,
            episodes: self.episodes,
            format: self.format,
            genres,
            synopsis: self.synopsis,
            site_url: self.site_url,
            updated_at: self.updated_at,
        }
    }
}

/// Repository for cached media items.
#[derive(Debug, Clone)]
pub struct MediaRepository {
    pool: SqlitePool,
}

impl MediaRepository {
    /// Creates a new MediaRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MediaRepository { pool }
    }

    /// Inserts or refreshes a media item and its genre links.
    pub async fn upsert(&self, media: &MediaItem) -> DbResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        upsert_in(&mut tx, media).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(())
    }

    /// Gets a media item by its remote id.
    pub async fn get(&self, id: i64) -> DbResult<Option<MediaItem>> {
        let mut conn = self.pool.acquire().await?;
        get_in(&mut conn, id).await
    }

    /// Lists every cached media item, ordered by title.
    pub async fn list(&self) -> DbResult<Vec<MediaItem>> {
        let mut conn = self.pool.acquire().await?;

        let rows = sqlx::query_as::<_, MediaRow>(
            r#"
            SELECT id, title_romaji, title_english, title_native,
                   cover_image_large, cover_image_medium, episodes, format,
                   synopsis, site_url, updated_at
            FROM media_items
            ORDER BY title_romaji ASC
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let genres = genres_in(&mut conn, row.id).await?;
            items.push(row.into_media(genres));
        }
        Ok(items)
    }

    /// Every distinct genre name, alphabetically.
    pub async fn genres(&self) -> DbResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM genres ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    /// Counts cached media items.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media_items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Connection-level helpers (shared with LibraryStore transactions)
// =============================================================================

pub(crate) async fn upsert_in(conn: &mut SqliteConnection, media: &MediaItem) -> DbResult<()> {
    validate_media(media).map_err(CoreError::from)?;

    debug!(media_id = media.id, title = %media.title_romaji, "Upserting media");

    sqlx::query(
        r#"
        INSERT INTO media_items (
            id, title_romaji, title_english, title_native,
            cover_image_large, cover_image_medium, episodes, format,
            synopsis, site_url, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(id) DO UPDATE SET
            title_romaji = excluded.title_romaji,
            title_english = excluded.title_english,
            title_native = excluded.title_native,
            cover_image_large = excluded.cover_image_large,
            cover_image_medium = excluded.cover_image_medium,
            episodes = excluded.episodes,
            format = excluded.format,
            synopsis = excluded.synopsis,
            site_url = excluded.site_url,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(media.id)
    .bind(&media.title_romaji)
    .bind(&media.title_english)
    .bind(&media.title_native)
    .bind(&media.cover_image_large)
    .bind(&media.cover_image_medium)
    .bind(media.episodes)
    .bind(media.format)
    .bind(&media.synopsis)
    .bind(&media.site_url)
    .bind(media.updated_at)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM media_genres WHERE media_id = ?1")
        .bind(media.id)
        .execute(&mut *conn)
        .await?;

    for name in media.genres.iter().map(|g| g.trim()).filter(|g| !g.is_empty()) {
        sqlx::query("INSERT INTO genres (name) VALUES (?1) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO media_genres (media_id, genre_id)
            SELECT ?1, id FROM genres WHERE name = ?2
            "#,
        )
        .bind(media.id)
        .bind(name)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub(crate) async fn get_in(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<MediaItem>> {
    let row = sqlx::query_as::<_, MediaRow>(
        r#"
        SELECT id, title_romaji, title_english, title_native,
               cover_image_large, cover_image_medium, episodes, format,
               synopsis, site_url, updated_at
        FROM media_items
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let genres = genres_in(conn, id).await?;
            Ok(Some(row.into_media(genres)))
        }
        None => Ok(None),
    }
}

pub(crate) async fn exists_in(conn: &mut SqliteConnection, id: i64) -> DbResult<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM media_items WHERE id = ?1)")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

/// Known episode count for a media item, if cached and reported.
pub(crate) async fn episodes_in(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<u32>> {
    let episodes: Option<Option<u32>> =
        sqlx::query_scalar("SELECT episodes FROM media_items WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(episodes.flatten())
}

async fn genres_in(conn: &mut SqliteConnection, media_id: i64) -> DbResult<Vec<String>> {
    let names: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT g.name
        FROM media_genres mg
        JOIN genres g ON g.id = mg.genre_id
        WHERE mg.media_id = ?1
        ORDER BY mg.rowid ASC
        "#,
    )
    .bind(media_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(names)
}
