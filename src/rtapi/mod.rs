pub mod client;
pub mod schema;

pub use client::{is_released, RtClient};
pub use schema::{MovieDoc, MovieReviews, RemoteReview, SearchResponse};
