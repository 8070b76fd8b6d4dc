//! HTTP endpoints.
//!
//! Both endpoints take a `data` query parameter holding JSON of the form
//! `{"movies": ["Title", ...]}` and answer with one entry per title, in order.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::cache::ReviewCache;
use crate::error::{Error, Result};
use crate::models::Review;

/// Shared state handed to every request handler
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ReviewCache>,
}

impl AppState {
    pub fn new(cache: ReviewCache) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DataParam {
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TitleList {
    movies: Vec<String>,
}

#[derive(Debug, Serialize)]
struct MoviesResponse {
    movies: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct ReviewsResponse {
    reviews: Vec<Vec<Review>>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        error!(error = %self, "Request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/movies", get(movies))
        .route("/reviews", get(reviews))
        .with_state(state)
}

/// Serve until Ctrl-C
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Listening");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}

/// GET /movies - raw search result per title, never cached
async fn movies(
    State(state): State<AppState>,
    Query(params): Query<DataParam>,
) -> Result<Json<MoviesResponse>> {
    let titles = parse_titles(params.data.as_deref())?;
    let movies = state.cache.search_all(&titles).await?;
    Ok(Json(MoviesResponse { movies }))
}

/// GET /reviews - cached reviews per title, fetching missing titles first
async fn reviews(
    State(state): State<AppState>,
    Query(params): Query<DataParam>,
) -> Result<Json<ReviewsResponse>> {
    let titles = parse_titles(params.data.as_deref())?;
    let reviews = state.cache.reviews_for_titles(&titles).await?;
    Ok(Json(ReviewsResponse { reviews }))
}

fn parse_titles(data: Option<&str>) -> Result<Vec<String>> {
    let data = data.ok_or_else(|| Error::Parse("Missing data parameter".to_string()))?;
    let list: TitleList = serde_json::from_str(data)
        .map_err(|e| Error::Parse(format!("Invalid data parameter: {}", e)))?;
    Ok(list.movies)
}
