use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::gateway::Metered;
use crate::job_cache::{JobStats, JobStatus};
use crate::upstream::Rating;

pub const STATUS_ACCEPTED: &str = "request accepted";
pub const STATUS_IN_PROGRESS: &str = "request in progress";
pub const STATUS_COMPLETED: &str = "request completed";
pub const STATUS_FAILED: &str = "request failed";

impl<T: Serialize> IntoResponse for Metered<T> {
    fn into_response(self) -> Response {
        let mut resp = Json(self.body).into_response();
        let headers = resp.headers_mut();
        headers.insert("x-ratelimit-limit", HeaderValue::from(self.limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(self.remaining));
        resp
    }
}

#[derive(Debug, Serialize)]
pub struct RatingResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<JobStatus> for RatingResponse {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Accepted => Self::status_only(STATUS_ACCEPTED),
            JobStatus::InProgress => Self::status_only(STATUS_IN_PROGRESS),
            JobStatus::Completed(rating) => Self {
                status: STATUS_COMPLETED,
                rating: Some(rating),
                error: None,
            },
            JobStatus::Failed(reason) => Self {
                status: STATUS_FAILED,
                rating: None,
                error: Some(reason),
            },
        }
    }
}

impl RatingResponse {
    fn status_only(status: &'static str) -> Self {
        Self {
            status,
            rating: None,
            error: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub upstream: String,
    pub rate_limit_keys: usize,
    pub jobs: JobStats,
}

impl HealthResponse {
    pub fn healthy(upstream: &str, rate_limit_keys: usize, jobs: JobStats) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            upstream: upstream.to_string(),
            rate_limit_keys,
            jobs,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub status: String,
    pub message: String,
    pub key: String,
}

impl ResetResponse {
    pub fn new(key: String, existed: bool) -> Self {
        let message = if existed {
            "Rate limit window reset"
        } else {
            "No open window for key"
        };
        Self {
            status: "success".to_string(),
            message: message.to_string(),
            key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_response_labels() {
        let json = serde_json::to_value(RatingResponse::from(JobStatus::Accepted)).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "request accepted" }));

        let json = serde_json::to_value(RatingResponse::from(JobStatus::Completed(Rating {
            genre_id: 28,
            average_vote: 7.5,
            movie_count: 10,
        })))
        .unwrap();
        assert_eq!(json["status"], "request completed");
        assert_eq!(json["rating"]["average_vote"], 7.5);

        let json =
            serde_json::to_value(RatingResponse::from(JobStatus::Failed("boom".into()))).unwrap();
        assert_eq!(json["status"], "request failed");
        assert_eq!(json["error"], "boom");
    }
}
