//! Error types for reget core

use thiserror::Error;

/// Errors surfaced by the core.
///
/// Transfer failures (`HttpStatus`, `Network`, `Io`) are caught inside the
/// orchestrator's job and converted to a persisted `ERROR` status; they never
/// reach the caller of `resume`. `NotFound` and the storage variants
/// propagate.
#[derive(Debug, Error)]
pub enum RegetError {
    #[error("no such task: {0}")]
    NotFound(i64),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP {status} while downloading {url}")]
    HttpStatus { status: u16, url: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage error: {0}")]
    Storage(String),
}
