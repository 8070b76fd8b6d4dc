use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::config::RemoteConfig;
use crate::dates::parse_date;
use crate::error::{Error, Result};

use super::schema::{MovieDoc, MovieReviews, RemoteReview, SearchResponse};

const DEFAULT_BASE_URL: &str = "http://api.rottentomatoes.com/api/public/v1.0/";
const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Client for the movie review-aggregation API
pub struct RtClient {
    client: Client,
    api_key: String,
    base_url: String,
    page_limit: u32,
}

impl RtClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }

    pub fn from_config(api_key: &str, remote: &RemoteConfig) -> Self {
        Self::new(api_key)
            .with_base_url(&remote.base_url)
            .with_page_limit(remote.page_limit)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn with_page_limit(mut self, page_limit: u32) -> Self {
        self.page_limit = page_limit.max(1);
        self
    }

    /// Absolute endpoints (such as a movie's reviews link) are used as-is
    fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                endpoint.trim_start_matches('/')
            )
        }
    }

    fn with_key(&self, params: &[(&str, String)]) -> Vec<(String, String)> {
        let mut payload: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        payload.push(("apikey".to_string(), self.api_key.clone()));
        payload
    }

    /// GET an endpoint with query parameters
    pub async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = self.url(endpoint);
        debug!(url = %url, "GET");

        let response = self
            .client
            .get(&url)
            .query(&self.with_key(params))
            .send()
            .await?;

        Self::read_json(response).await
    }

    /// POST an endpoint with form-encoded parameters
    pub async fn post(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = self.url(endpoint);
        debug!(url = %url, "POST");

        let response = self
            .client
            .post(&url)
            .form(&self.with_key(params))
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn read_json(response: Response) -> Result<Value> {
        let response = response.error_for_status()?;
        Ok(response.json().await?)
    }

    /// Fetch every page of an endpoint and concatenate the list under `extract_key`.
    ///
    /// The first page's `total` drives the loop: another page is requested while
    /// the remaining count is at least one page, so a total that is an exact
    /// multiple of the page limit costs one extra (empty) request.
    pub async fn get_all_pages<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        extract_key: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let page_limit = u64::from(self.page_limit);

        let first = self
            .get(endpoint, &page_params(params, 1, self.page_limit))
            .await?;

        let mut extracted: Vec<T> = extract_list(&first, extract_key)?;
        let mut remaining = first.get("total").and_then(Value::as_u64).unwrap_or(0);
        let mut page = 2;

        while remaining >= page_limit {
            let result = self
                .get(endpoint, &page_params(params, page, self.page_limit))
                .await?;
            let items: Vec<T> = extract_list(&result, extract_key)?;
            debug!(page, count = items.len(), "Fetched page");

            extracted.extend(items);
            page += 1;
            remaining -= page_limit;
        }

        Ok(extracted)
    }

    /// Search for movies by free-text title; returns the raw response
    #[instrument(skip(self))]
    pub async fn search(&self, title: &str) -> Result<Value> {
        self.get("movies.json", &[("q", title.to_string())]).await
    }

    /// Resolve a title to its canonical released movie and fetch all of its reviews
    #[instrument(skip(self))]
    pub async fn reviews(&self, title: &str) -> Result<MovieReviews> {
        let search: SearchResponse = serde_json::from_value(self.search(title).await?)?;

        let candidates = search.movies.unwrap_or_default();
        if candidates.is_empty() {
            return Err(Error::NotFound(format!("Could not find movie {}", title)));
        }

        let now = Utc::now();
        let mut canonical = None;
        for doc in candidates {
            if is_released(&doc, now)? {
                canonical = Some(doc);
                break;
            }
        }

        let doc = canonical.ok_or_else(|| {
            Error::NotFound(format!("No released movie found for {}", title))
        })?;

        let reviews_url = doc
            .reviews_link()
            .ok_or_else(|| Error::Lookup(format!("No reviews for {}", doc.display_name())))?;

        let (id, movie_title) = match (&doc.id, &doc.title) {
            (Some(id), Some(t)) => (id.clone(), t.clone()),
            _ => {
                return Err(Error::Lookup(format!(
                    "Incomplete movie record for {}",
                    doc.display_name()
                )))
            }
        };

        let reviews: Vec<RemoteReview> = self
            .get_all_pages(reviews_url, "reviews", &[("review_type", "all".to_string())])
            .await?;

        info!(id = %id, title = %movie_title, count = reviews.len(), "Fetched reviews");

        Ok(MovieReviews {
            id,
            title: movie_title,
            reviews,
        })
    }
}

/// A candidate is released when any of its release dates is at or before `now`.
/// Candidates without release dates never are.
pub fn is_released(doc: &MovieDoc, now: DateTime<Utc>) -> Result<bool> {
    let Some(dates) = doc.release_dates.as_ref() else {
        return Ok(false);
    };

    for raw in dates.values() {
        if parse_date(raw)? <= now {
            return Ok(true);
        }
    }

    Ok(false)
}

fn page_params<'a>(params: &[(&'a str, String)], page: u32, page_limit: u32) -> Vec<(&'a str, String)> {
    let mut all = params.to_vec();
    all.push(("page", page.to_string()));
    all.push(("page_limit", page_limit.to_string()));
    all
}

fn extract_list<T: DeserializeOwned>(value: &Value, key: &str) -> Result<Vec<T>> {
    match value.get(key) {
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(list) => Ok(serde_json::from_value(list.clone())?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> RtClient {
        RtClient::new("test-key").with_base_url(&format!("{}/", server.uri()))
    }

    fn doc(release_dates: serde_json::Value) -> MovieDoc {
        serde_json::from_value(json!({
            "id": "1",
            "title": "Doc",
            "release_dates": release_dates,
        }))
        .unwrap()
    }

    async fn mount_search(server: &MockServer, title: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/movies.json"))
            .and(query_param("q", title))
            .and(query_param("apikey", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_review_page(server: &MockServer, page: u32, total: u64, critics: &[&str]) {
        let reviews: Vec<_> = critics
            .iter()
            .map(|c| json!({"critic": c, "freshness": "fresh", "publication": "Daily"}))
            .collect();

        Mock::given(method("GET"))
            .and(path("/movies/42/reviews.json"))
            .and(query_param("page", page.to_string()))
            .and(query_param("review_type", "all"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"total": total, "reviews": reviews})),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn test_is_released() {
        let now = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap();

        assert!(is_released(&doc(json!({"theater": "2010-06-18"})), now).unwrap());
        assert!(is_released(&doc(json!({"theater": "2015-01-01"})), now).unwrap());
        assert!(!is_released(&doc(json!({"theater": "2016-05-01"})), now).unwrap());
        assert!(!is_released(&doc(json!({})), now).unwrap());
        assert!(!is_released(&doc(json!(null)), now).unwrap());
    }

    #[test]
    fn test_is_released_any_entry_counts() {
        let now = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap();
        let d = doc(json!({"dvd": "2014-03-01", "theater": "2016-01-01"}));
        assert!(is_released(&d, now).unwrap());
    }

    #[test]
    fn test_is_released_malformed_date() {
        let now = Utc::now();
        let err = is_released(&doc(json!({"theater": "soon"})), now).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_url_resolution() {
        let client = RtClient::new("k").with_base_url("http://api.test/v1.0");
        assert_eq!(client.url("movies.json"), "http://api.test/v1.0/movies.json");
        assert_eq!(
            client.url("https://other.test/reviews.json"),
            "https://other.test/reviews.json"
        );
    }

    #[tokio::test]
    async fn test_search_returns_raw_response() {
        let server = MockServer::start().await;
        let body = json!({"total": 1, "movies": [{"id": "1", "title": "Inception", "extra": [1, 2]}]});
        mount_search(&server, "Inception", body.clone()).await;

        let result = client_for(&server).search("Inception").await.unwrap();
        assert_eq!(result, body);
    }

    #[tokio::test]
    async fn test_post_sends_form_with_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/lists.json"))
            .and(body_string_contains("apikey=test-key"))
            .and(body_string_contains("name=mine"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .post("lists.json", &[("name", "mine".to_string())])
            .await
            .unwrap();
        assert_eq!(result["ok"], true);
    }

    #[tokio::test]
    async fn test_http_error_is_remote_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movies.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server).search("Anything").await.unwrap_err();
        assert!(matches!(err, Error::Remote(_)));
    }

    #[tokio::test]
    async fn test_reviews_unknown_title_not_found() {
        let server = MockServer::start().await;
        mount_search(&server, "Nothing", json!({"total": 0, "movies": []})).await;

        let err = client_for(&server).reviews("Nothing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_reviews_missing_movies_key_not_found() {
        let server = MockServer::start().await;
        mount_search(&server, "Nothing", json!({"total": 0})).await;

        let err = client_for(&server).reviews("Nothing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_reviews_only_unreleased_not_found() {
        let server = MockServer::start().await;
        mount_search(
            &server,
            "Future",
            json!({"movies": [
                {"id": "1", "title": "Future", "release_dates": {"theater": "2999-01-01"}},
                {"id": "2", "title": "Future II"}
            ]}),
        )
        .await;

        let err = client_for(&server).reviews("Future").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_reviews_without_link_is_lookup_failure() {
        let server = MockServer::start().await;
        mount_search(
            &server,
            "Linkless",
            json!({"movies": [
                {"id": "1", "title": "Linkless", "release_dates": {"theater": "2001-01-01"}, "links": {}}
            ]}),
        )
        .await;

        let err = client_for(&server).reviews("Linkless").await.unwrap_err();
        match err {
            Error::Lookup(msg) => assert!(msg.contains("Linkless")),
            other => panic!("expected lookup failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reviews_uses_first_released_candidate() {
        let server = MockServer::start().await;
        let link = format!("{}/movies/42/reviews.json", server.uri());
        mount_search(
            &server,
            "Heat",
            json!({"movies": [
                {"id": "41", "title": "Heat 2", "release_dates": {"theater": "2999-01-01"},
                 "links": {"reviews": "http://unused.test/reviews.json"}},
                {"id": 42, "title": "Heat", "release_dates": {"theater": "1995-12-15"},
                 "links": {"reviews": link}}
            ]}),
        )
        .await;
        mount_review_page(&server, 1, 2, &["A", "B"]).await;

        let result = client_for(&server).reviews("Heat").await.unwrap();
        assert_eq!(result.id, "42");
        assert_eq!(result.title, "Heat");
        assert_eq!(result.reviews.len(), 2);
    }

    #[tokio::test]
    async fn test_pagination_fetches_three_pages_for_120() {
        let server = MockServer::start().await;
        mount_review_page(&server, 1, 120, &["A"]).await;
        mount_review_page(&server, 2, 120, &["B"]).await;
        mount_review_page(&server, 3, 120, &["C"]).await;

        let link = format!("{}/movies/42/reviews.json", server.uri());
        let reviews: Vec<RemoteReview> = client_for(&server)
            .get_all_pages(&link, "reviews", &[("review_type", "all".to_string())])
            .await
            .unwrap();

        let critics: Vec<_> = reviews.iter().map(|r| r.critic.as_str()).collect();
        assert_eq!(critics, vec!["A", "B", "C"]);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_pagination_total_equal_to_page_limit_fetches_two_pages() {
        let server = MockServer::start().await;
        mount_review_page(&server, 1, 50, &["A"]).await;
        mount_review_page(&server, 2, 50, &[]).await;

        let link = format!("{}/movies/42/reviews.json", server.uri());
        let reviews: Vec<RemoteReview> = client_for(&server)
            .get_all_pages(&link, "reviews", &[("review_type", "all".to_string())])
            .await
            .unwrap();

        assert_eq!(reviews.len(), 1);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_pagination_single_page_below_limit() {
        let server = MockServer::start().await;
        mount_review_page(&server, 1, 49, &["A", "B"]).await;

        let link = format!("{}/movies/42/reviews.json", server.uri());
        let reviews: Vec<RemoteReview> = client_for(&server)
            .get_all_pages(&link, "reviews", &[("review_type", "all".to_string())])
            .await
            .unwrap();

        assert_eq!(reviews.len(), 2);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pagination_requests_page_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movies/42/reviews.json"))
            .and(query_param("page", "1"))
            .and(query_param("page_limit", "20"))
            .and(query_param("apikey", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reviews": []})))
            .expect(1)
            .mount(&server)
            .await;

        let reviews: Vec<RemoteReview> = client_for(&server)
            .with_page_limit(20)
            .get_all_pages("movies/42/reviews.json", "reviews", &[])
            .await
            .unwrap();

        assert!(reviews.is_empty());
    }
}
