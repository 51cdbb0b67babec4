// src/error.rs
use thiserror::Error;

/// Errors surfaced by the scoring and ranking read path.
///
/// An unknown identifier is a distinct "not found" variant so the calling
/// layer can map it to its own response code. A student that exists but has
/// no skills is a valid zero-score result, not an error.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("student {0} not found")]
    StudentNotFound(i64),

    #[error("opportunity {0} not found")]
    OpportunityNotFound(i64),

    #[error("external job {0} not found")]
    ExternalJobNotFound(i64),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
