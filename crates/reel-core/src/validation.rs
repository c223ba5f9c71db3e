//! # Validation Module
//!
//! Input validation for library mutations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI layer                                                     │
//! │  └── Steppers/sliders keep values in range                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── progress <= episodes (when known)                                 │
//! │  └── score within 0.0..=10.0                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (progress >= 0)                                             │
//! │  └── UNIQUE (media_id)                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::{MediaItem, Score};
use crate::MAX_SCORE_TENTHS;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates watched progress against the known episode count.
///
/// ## Example
/// ```rust
/// use reel_core::validation::validate_progress;
///
/// assert!(validate_progress(12, Some(12)).is_ok());
/// assert!(validate_progress(13, Some(12)).is_err());
/// assert!(validate_progress(500, None).is_ok());
/// ```
pub fn validate_progress(progress: u32, episodes: Option<u32>) -> ValidationResult<()> {
    match episodes {
        Some(total) if progress > total => Err(ValidationError::OutOfRange {
            field: "progress".to_string(),
            min: 0,
            max: total as i64,
        }),
        _ => Ok(()),
    }
}

/// Validates an optional score.
pub fn validate_score(score: Option<Score>) -> ValidationResult<()> {
    match score {
        Some(s) if s.tenths() > MAX_SCORE_TENTHS => Err(ValidationError::OutOfRange {
            field: "score".to_string(),
            min: 0,
            max: MAX_SCORE_TENTHS as i64,
        }),
        _ => Ok(()),
    }
}

/// Validates a media item before it is cached locally.
pub fn validate_media(media: &MediaItem) -> ValidationResult<()> {
    if media.title_romaji.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "title_romaji".to_string(),
        });
    }

    if media.id <= 0 {
        return Err(ValidationError::OutOfRange {
            field: "media_id".to_string(),
            min: 1,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Clamps remote-reported progress to the known episode count.
///
/// The remote occasionally reports progress beyond a since-corrected
/// episode total; local state keeps the `progress <= episodes` invariant.
pub fn clamp_progress(progress: u32, episodes: Option<u32>) -> u32 {
    match episodes {
        Some(total) => progress.min(total),
        None => progress,
    }
}
