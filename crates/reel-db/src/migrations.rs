//! # Schema Migrations
//!
//! The SQL files under `migrations/sqlite/` are compiled into the binary and
//! applied in file-name order when a [`Database`](crate::Database) opens.
//! sqlx records each applied file in `_sqlx_migrations`, so reopening an
//! existing library is a no-op.
//!
//! Applied files are checksummed. Editing one after release makes every
//! existing library fail to open; ship a new `NNN_*.sql` instead.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    debug!(count = MIGRATOR.migrations.len(), "Schema up to date");
    Ok(())
}

/// `(embedded, applied)` migration counts.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await?;
    Ok((MIGRATOR.migrations.len(), applied as usize))
}
