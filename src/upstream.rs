//! The metadata provider seam.
//!
//! The gateway never talks to a provider directly; it holds an
//! `Arc<dyn Upstream>` and forwards the payloads unchanged. Two providers
//! ship with the crate: [`crate::tmdb::TmdbClient`] for the live TMDB API and
//! [`crate::catalog::Catalog`] for offline use.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Movie details as returned by the provider.
///
/// Only the fields the gateway reads are typed; everything else the provider
/// sends is kept in `extra` and serialized back out untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genre_ids: Vec<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One page of a paginated movie listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoviePage {
    pub page: u32,
    pub results: Vec<Movie>,
    pub total_results: u64,
    pub total_pages: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of the expensive rating computation for a genre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub genre_id: u64,
    pub average_vote: f64,
    pub movie_count: u64,
}

#[async_trait]
pub trait Upstream: Send + Sync {
    /// Popular movies, one page at a time
    async fn popular_movies(&self, page: u32) -> Result<MoviePage>;

    /// Details of a single movie. Unknown ids yield `GatewayError::NotFound`.
    async fn movie(&self, id: u64) -> Result<Movie>;

    /// Whether the provider knows the genre. Expected to be cheap.
    async fn genre_exists(&self, genre_id: u64) -> Result<bool>;

    /// Average vote over every movie of a genre. May take minutes.
    async fn genre_rating(&self, genre_id: u64) -> Result<Rating>;
}
