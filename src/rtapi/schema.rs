//! Response schemas for the review API.
//!
//! Only the fields the cache reads are declared; anything else in a payload is
//! ignored. Optional fields are explicit so a missing key is never a failure,
//! while a present key of the wrong type is.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

/// Body of `movies.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub movies: Option<Vec<MovieDoc>>,
}

/// One search candidate
#[derive(Debug, Clone, Deserialize)]
pub struct MovieDoc {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Release kind (theater, dvd, ...) to date string
    #[serde(default)]
    pub release_dates: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub links: Option<MovieLinks>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovieLinks {
    #[serde(default)]
    pub reviews: Option<String>,
}

impl MovieDoc {
    pub fn reviews_link(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|l| l.reviews.as_deref())
            .filter(|url| !url.is_empty())
    }

    /// Name used in error messages: title, then id
    pub fn display_name(&self) -> &str {
        self.title
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("<unnamed movie>")
    }
}

/// One review record from a reviews page
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteReview {
    pub critic: String,
    /// "fresh" or "rotten"
    pub freshness: String,
    #[serde(default)]
    pub publication: Option<String>,
    #[serde(default)]
    pub original_score: Option<String>,
    #[serde(default)]
    pub quote: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub links: Option<ReviewLinks>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewLinks {
    #[serde(default)]
    pub review: Option<String>,
}

impl RemoteReview {
    pub fn is_fresh(&self) -> bool {
        self.freshness == "fresh"
    }

    /// The review's `url`, falling back to `links.review`
    pub fn source_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or_else(|| self.links.as_ref().and_then(|l| l.review.as_deref()))
            .filter(|url| !url.is_empty())
    }
}

/// The canonical candidate for a title together with all of its reviews
#[derive(Debug, Clone)]
pub struct MovieReviews {
    pub id: String,
    pub title: String,
    pub reviews: Vec<RemoteReview>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(Option::<Id>::deserialize(deserializer)?.map(|id| match id {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    }))
}
