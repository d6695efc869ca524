use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Upstream(err.to_string())
    }
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub code: u16,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, code: u16) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            code,
        }
    }

    pub fn from_gateway_error(err: &GatewayError) -> Self {
        let code = err.status_code().as_u16();
        match err {
            GatewayError::NotFound(msg) => Self::new("not_found", msg, code),
            GatewayError::RateLimitExceeded { .. } => {
                Self::new("rate_limit_exceeded", "Request rate limit exceeded", code)
            }
            GatewayError::Upstream(msg) => Self::new("upstream_error", msg, code),
            GatewayError::ValidationError(msg) => Self::new("validation_error", msg, code),
            GatewayError::InternalError(msg) => Self::new("internal_error", msg, code),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = ErrorResponse::from_gateway_error(&self);
        let mut resp = (self.status_code(), Json(body)).into_response();

        if let GatewayError::RateLimitExceeded { retry_after_secs } = self {
            resp.headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }

        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_response_carries_retry_after() {
        let resp = GatewayError::RateLimitExceeded { retry_after_secs: 42 }.into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers()[header::RETRY_AFTER], "42");
    }

    #[test]
    fn test_error_body_mapping() {
        let body = ErrorResponse::from_gateway_error(&GatewayError::NotFound("movie 7".into()));
        assert_eq!(body.error, "not_found");
        assert_eq!(body.message, "movie 7");
        assert_eq!(body.code, 404);

        let body = ErrorResponse::from_gateway_error(&GatewayError::Upstream("timeout".into()));
        assert_eq!(body.code, 502);
    }
}
