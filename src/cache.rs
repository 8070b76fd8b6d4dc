use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::dates::parse_date;
use crate::error::Result;
use crate::models::{Movie, NewReview, Review, SaveSummary};
use crate::rtapi::{RemoteReview, RtClient};
use crate::store::Store;

/// Fetch-if-absent cache of movie reviews in front of the review API
pub struct ReviewCache {
    client: RtClient,
    store: Store,
}

impl ReviewCache {
    pub fn new(client: RtClient, store: Store) -> Self {
        Self { client, store }
    }

    pub fn client(&self) -> &RtClient {
        &self.client
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Raw search result for each title, in input order
    pub async fn search_all(&self, titles: &[String]) -> Result<Vec<Value>> {
        let mut results = Vec::with_capacity(titles.len());
        for title in titles {
            results.push(self.client.search(title).await?);
        }
        Ok(results)
    }

    /// Fetch a title's reviews from the API and store the movie, its critics and
    /// every review.
    ///
    /// Any review with a malformed date aborts the call before anything is written.
    #[instrument(skip(self))]
    pub async fn add_movie(&self, title: &str) -> Result<(Movie, SaveSummary)> {
        let fetched = self.client.reviews(title).await?;

        let movie = Movie {
            id: fetched.id,
            title: fetched.title,
        };

        let reviews = fetched
            .reviews
            .iter()
            .map(to_new_review)
            .collect::<Result<Vec<_>>>()?;

        let summary = self.store.save_movie(&movie, &reviews).await?;

        info!(
            id = %movie.id,
            title = %movie.title,
            reviews = summary.reviews,
            critics_created = summary.critics_created,
            "Cached movie"
        );

        Ok((movie, summary))
    }

    /// Run [`add_movie`](Self::add_movie) unless the title is already cached.
    /// Returns the summary when a fetch happened.
    pub async fn ensure_cached(&self, title: &str) -> Result<Option<SaveSummary>> {
        if self.store.has_movie(title).await? {
            return Ok(None);
        }

        info!(title, "Cache miss");
        let (_, summary) = self.add_movie(title).await?;
        Ok(Some(summary))
    }

    /// Cached reviews for each title, in input order, fetching missing titles first.
    ///
    /// A title that still has no exact match after fetching (the API's canonical
    /// title differs) yields an empty list.
    pub async fn reviews_for_titles(&self, titles: &[String]) -> Result<Vec<Vec<Review>>> {
        for title in titles {
            self.ensure_cached(title).await?;
        }

        let mut all = Vec::with_capacity(titles.len());
        for title in titles {
            match self.store.find_movie_by_title(title).await? {
                Some(movie) => all.push(self.store.reviews_for_movie(&movie.id).await?),
                None => {
                    warn!(title = %title, "No cached movie under this title after fetch");
                    all.push(Vec::new());
                }
            }
        }

        Ok(all)
    }
}

fn to_new_review(review: &RemoteReview) -> Result<NewReview> {
    let date = review
        .date
        .as_deref()
        .filter(|d| !d.is_empty())
        .map(parse_date)
        .transpose()?;

    Ok(NewReview {
        critic: review.critic.clone(),
        publication: review.publication.clone().filter(|p| !p.is_empty()),
        fresh: review.is_fresh(),
        original_score: review.original_score.clone(),
        quote: review.quote.clone(),
        url: review.source_url().map(str::to_string),
        date,
    })
}
