//! # Seed Data Generator
//!
//! Populates a database with a sample library for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./reel_dev.db
//! cargo run -p reel-db --bin seed
//!
//! # Specify database path
//! cargo run -p reel-db --bin seed -- --db ./data/reel.db
//!
//! # Also queue the mirrored remote operations
//! cargo run -p reel-db --bin seed -- --with-queue
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use chrono::Utc;
use reel_core::{EntryStatus, MediaFormat, MediaItem, NewOperation, Score};
use reel_db::{Database, DbConfig};
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (id, romaji title, english title, episodes, format, genres, status, progress, score tenths)
type SeedRow = (
    i64,
    &'static str,
    Option<&'static str>,
    Option<u32>,
    MediaFormat,
    &'static [&'static str],
    EntryStatus,
    u32,
    Option<u8>,
);

const LIBRARY: &[SeedRow] = &[
    (
        457,
        "Mushishi",
        None,
        Some(26),
        MediaFormat::Tv,
        &["Adventure", "Mystery", "Slice of Life"],
        EntryStatus::Completed,
        26,
        Some(95),
    ),
    (
        1,
        "Cowboy Bebop",
        None,
        Some(26),
        MediaFormat::Tv,
        &["Action", "Drama", "Sci-Fi"],
        EntryStatus::Watching,
        14,
        None,
    ),
    (
        21,
        "ONE PIECE",
        None,
        None,
        MediaFormat::Tv,
        &["Action", "Adventure", "Comedy"],
        EntryStatus::Watching,
        1010,
        Some(85),
    ),
    (
        20954,
        "Koe no Katachi",
        Some("A Silent Voice"),
        Some(1),
        MediaFormat::Movie,
        &["Drama", "Romance"],
        EntryStatus::PlanToWatch,
        0,
        None,
    ),
    (
        9253,
        "Steins;Gate",
        None,
        Some(24),
        MediaFormat::Tv,
        &["Drama", "Sci-Fi", "Thriller"],
        EntryStatus::OnHold,
        9,
        None,
    ),
    (
        20,
        "NARUTO",
        Some("Naruto"),
        Some(220),
        MediaFormat::Tv,
        &["Action", "Adventure"],
        EntryStatus::Dropped,
        57,
        Some(60),
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./reel_dev.db");
    let mut with_queue = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--with-queue" | "-q" => with_queue = true,
            "--help" | "-h" => {
                println!("Reel Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./reel_dev.db)");
                println!("  -q, --with-queue   Queue the mirrored remote operations");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let db = Database::new(DbConfig::new(&db_path)).await?;
    info!(path = %db_path, "Connected to database");

    let existing = db.library().fetch_all().await?.len();
    if existing > 0 {
        warn!(existing, "Library already populated; skipping seed");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut added = 0usize;

    for (id, romaji, english, episodes, format, genres, status, progress, score) in LIBRARY {
        let media = MediaItem {
            id: *id,
            title_romaji: romaji.to_string(),
            title_english: english.map(str::to_string),
            title_native: None,
            cover_image_large: None,
            cover_image_medium: None,
            episodes: *episodes,
            format: Some(*format),
            genres: genres.iter().map(|g| g.to_string()).collect(),
            synopsis: None,
            site_url: Some(format!("https://anilist.co/anime/{id}")),
            updated_at: Utc::now(),
        };
        let score = score.map(Score::from_tenths).transpose()?;

        let entry = match db.library().add(&media, *status, *progress, score).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(media_id = id, error = %e, "Failed to add entry");
                continue;
            }
        };

        if with_queue {
            db.queue()
                .enqueue(&NewOperation::status(entry.media_id, entry.status))
                .await?;
            if entry.progress > 0 {
                db.queue()
                    .enqueue(&NewOperation::progress(entry.media_id, entry.progress))
                    .await?;
            }
        }

        added += 1;
    }

    info!(
        added,
        queued = db.queue().count_pending().await?,
        genres = db.media().genres().await?.len(),
        elapsed = ?start.elapsed(),
        "Seed complete"
    );

    for status in EntryStatus::ALL {
        let entries = db.library().fetch_by_status(status).await?;
        info!(status = %status, count = entries.len(), "List");
    }

    Ok(())
}
