use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A movie cached from the review API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    /// Identifier assigned by the remote API
    pub id: String,
    pub title: String,
}

/// A critic, identified by name and publication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Critic {
    pub id: i64,
    pub name: String,
    pub publication: Option<String>,
}

/// A review ready to be written to the store
#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub critic: String,
    pub publication: Option<String>,
    pub fresh: bool,
    pub original_score: Option<String>,
    pub quote: Option<String>,
    pub url: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// A persisted review, as returned by `GET /reviews`.
///
/// Serialized field names are stable:
/// `id`, `movie_id`, `critic`, `publication`, `fresh`, `original_score`,
/// `quote`, `url`, `date` (RFC 3339 or null).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub movie_id: String,
    pub critic: String,
    pub publication: Option<String>,
    pub fresh: bool,
    pub original_score: Option<String>,
    pub quote: Option<String>,
    pub url: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// Outcome of caching one movie
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub reviews: usize,
    pub critics_created: usize,
}

/// Row counts in the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub movies: u64,
    pub critics: u64,
    pub reviews: u64,
}
