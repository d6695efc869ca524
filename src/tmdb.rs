//! TMDB v3 provider.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::error::{GatewayError, Result};
use crate::upstream::{Movie, MoviePage, Rating, Upstream};
use crate::validation::MAX_PAGE;

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

#[derive(Debug, Deserialize)]
struct GenreList {
    genres: Vec<Genre>,
}

#[derive(Debug, Deserialize)]
struct Genre {
    id: u64,
}

pub struct TmdbClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    // Filled on first successful fetch of /genre/movie/list
    genres: OnceCell<HashSet<u64>>,
}

impl TmdbClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("moviegate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                GatewayError::InternalError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            genres: OnceCell::new(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(query)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json::<T>().await?),
            StatusCode::NOT_FOUND => Err(GatewayError::NotFound(format!(
                "{} not found upstream",
                path
            ))),
            status => {
                tracing::error!(path = %path, status = %status, "TMDB request failed");
                Err(GatewayError::Upstream(format!("{} returned {}", path, status)))
            }
        }
    }

    async fn discover_page(&self, genre_id: u64, page: u32) -> Result<MoviePage> {
        self.get_json(
            "/discover/movie",
            &[("with_genres", genre_id.to_string()), ("page", page.to_string())],
        )
        .await
    }

    async fn movie_genres(&self) -> Result<&HashSet<u64>> {
        self.genres
            .get_or_try_init(|| async {
                let list: GenreList = self.get_json("/genre/movie/list", &[]).await?;
                tracing::debug!(count = list.genres.len(), "Loaded TMDB genre list");
                Ok::<_, GatewayError>(list.genres.into_iter().map(|g| g.id).collect())
            })
            .await
    }
}

#[async_trait]
impl Upstream for TmdbClient {
    async fn popular_movies(&self, page: u32) -> Result<MoviePage> {
        self.get_json("/movie/popular", &[("page", page.to_string())]).await
    }

    async fn movie(&self, id: u64) -> Result<Movie> {
        self.get_json(&format!("/movie/{}", id), &[]).await
    }

    async fn genre_exists(&self, genre_id: u64) -> Result<bool> {
        Ok(self.movie_genres().await?.contains(&genre_id))
    }

    /// Walks every discover page of the genre, which is what makes this slow.
    async fn genre_rating(&self, genre_id: u64) -> Result<Rating> {
        let first = self.discover_page(genre_id, 1).await?;
        let last_page = first.total_pages.min(MAX_PAGE);

        let mut sum: f64 = first.results.iter().map(|m| m.vote_average).sum();
        let mut count = first.results.len() as u64;

        for page in 2..=last_page {
            let next = self.discover_page(genre_id, page).await?;
            sum += next.results.iter().map(|m| m.vote_average).sum::<f64>();
            count += next.results.len() as u64;
            tracing::debug!(genre_id, page, last_page, "Fetched discover page");
        }

        if count == 0 {
            return Err(GatewayError::Upstream(format!("genre {} has no movies", genre_id)));
        }

        Ok(Rating {
            genre_id,
            average_vote: sum / count as f64,
            movie_count: count,
        })
    }
}
