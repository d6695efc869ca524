use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::response::{HealthResponse, RatingResponse, ResetResponse};

/// Shared application state
pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub gateway: Gateway,
    /// Name of the configured metadata provider, reported by `/health`
    pub upstream_name: String,
}

impl AppState {
    pub fn new(gateway: Gateway, upstream_name: impl Into<String>) -> SharedState {
        Arc::new(Self {
            gateway,
            upstream_name: upstream_name.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Kept as raw text so that non-numeric values can be told apart from missing ones
    pub page: Option<String>,
}

/// List popular movies
pub async fn list_movies(
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    state.gateway.list_movies(query.page.as_deref()).await
}

/// Movie details
pub async fn get_movie(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    state.gateway.movie(&id).await
}

/// Poll the rating job for a resource
pub async fn get_rating(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let status = state.gateway.rating(&id).await?;
    Ok(Json(RatingResponse::from(status)))
}

/// Get rate limit window state for a key
pub async fn get_rate_limit(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.gateway.rate_limit_status(&key)?))
}

/// Reset the rate limit window for a key
pub async fn delete_rate_limit(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let existed = state.gateway.reset_rate_limit(&key)?;
    Ok(Json(ResetResponse::new(key, existed)))
}

/// Health check endpoint
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    Json(HealthResponse::healthy(
        &state.upstream_name,
        state.gateway.tracked_rate_keys(),
        state.gateway.job_stats(),
    ))
}

/// Readiness check endpoint
pub async fn readiness_check(State(state): State<SharedState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ready",
        "upstream": state.upstream_name,
    }))
}

/// Fallback for unmatched routes, answered in the gateway's error format
pub async fn not_found() -> GatewayError {
    GatewayError::NotFound("no such route".to_string())
}
