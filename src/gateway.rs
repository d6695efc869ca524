use std::sync::Arc;

use crate::error::{GatewayError, Result};
use crate::job_cache::{JobCache, JobStats, JobStatus};
use crate::rate_limiter::{Decision, RateLimitRule, RateLimitStatus, RateLimiter};
use crate::upstream::{Movie, MoviePage, Upstream};
use crate::validation::RequestValidator;

/// Limiter key for `GET /movie`
pub const LIST_ROUTE_KEY: &str = "movie:list";
/// Limiter key for `GET /movie/{id}`
pub const DETAIL_ROUTE_KEY: &str = "movie:detail";

/// A payload admitted by the rate limiter, with the window state after admission.
#[derive(Debug, Clone)]
pub struct Metered<T> {
    pub body: T,
    pub limit: u32,
    pub remaining: u32,
}

/// Owns the shared limiter and job cache and routes requests through them.
pub struct Gateway {
    rate_limiter: RateLimiter,
    jobs: JobCache,
    upstream: Arc<dyn Upstream>,
}

impl Gateway {
    pub fn new(rule: RateLimitRule, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            rate_limiter: RateLimiter::new(rule),
            jobs: JobCache::new(upstream.clone()),
            upstream,
        }
    }

    fn admit(&self, key: &str) -> Result<(u32, u32)> {
        match self.rate_limiter.check_and_consume(key) {
            Decision::Allowed { remaining, limit } => Ok((limit, remaining)),
            Decision::Denied { retry_after, .. } => Err(GatewayError::RateLimitExceeded {
                retry_after_secs: retry_after.as_secs_f64().ceil().max(1.0) as u64,
            }),
        }
    }

    /// `GET /movie`
    pub async fn list_movies(&self, page: Option<&str>) -> Result<Metered<MoviePage>> {
        let page = RequestValidator::parse_page(page)?;
        let (limit, remaining) = self.admit(LIST_ROUTE_KEY)?;

        let body = self.upstream.popular_movies(page).await?;
        Ok(Metered { body, limit, remaining })
    }

    /// `GET /movie/{id}`. The id is resolved before admission, so an unknown
    /// id is a 404 that leaves the window untouched.
    pub async fn movie(&self, raw_id: &str) -> Result<Metered<Movie>> {
        let id = RequestValidator::parse_id(raw_id)?;
        let body = self.upstream.movie(id).await?;

        let (limit, remaining) = self.admit(DETAIL_ROUTE_KEY)?;
        Ok(Metered { body, limit, remaining })
    }

    /// `GET /rating/{id}`. Governed by job coalescing only.
    pub async fn rating(&self, raw_id: &str) -> Result<JobStatus> {
        let id = RequestValidator::parse_id(raw_id)?;

        // A job only ever exists for a genre that was known when it was created.
        if self.jobs.status(id).is_none() && !self.upstream.genre_exists(id).await? {
            return Err(GatewayError::NotFound(format!("genre {}", id)));
        }

        Ok(self.jobs.request_job(id))
    }

    pub fn rate_limit_status(&self, key: &str) -> Result<RateLimitStatus> {
        RequestValidator::validate_key(key)?;
        Ok(self.rate_limiter.status(key))
    }

    pub fn reset_rate_limit(&self, key: &str) -> Result<bool> {
        RequestValidator::validate_key(key)?;
        Ok(self.rate_limiter.reset(key))
    }

    pub fn cleanup_expired_windows(&self) -> usize {
        self.rate_limiter.cleanup_expired()
    }

    pub fn tracked_rate_keys(&self) -> usize {
        self.rate_limiter.tracked_keys()
    }

    pub fn job_stats(&self) -> JobStats {
        self.jobs.stats()
    }

    pub fn jobs(&self) -> &JobCache {
        &self.jobs
    }
}
