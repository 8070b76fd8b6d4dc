//! Error types for the review cache.

use thiserror::Error;

/// Errors surfaced by the remote client, the store and the upsert routine.
#[derive(Debug, Error)]
pub enum Error {
    /// No candidate movie, or no released candidate, matched a title.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A matched movie lacks something needed to fetch its reviews.
    #[error("Lookup failed: {0}")]
    Lookup(String),

    /// Malformed date string or malformed request JSON.
    #[error("Parse failed: {0}")]
    Parse(String),

    /// Network failure or non-success status from the remote API.
    #[error("Remote API request failed: {0}")]
    Remote(#[from] reqwest::Error),

    /// Remote payload did not match the expected schema.
    #[error("Unexpected remote response: {0}")]
    Schema(#[from] serde_json::Error),

    /// Underlying SQLite error.
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type Result<T> = std::result::Result<T, Error>;
