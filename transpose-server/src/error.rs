//! Error types for the Transpose HTTP boundary
//!
//! Internal failures from the provider and orchestration layers are mapped
//! onto HTTP status codes here; handlers never construct status codes
//! directly.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::providers::ProviderError;
use crate::transposer::TransposeError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upstream provider failure (502)
    #[error("Upstream provider error: {0}")]
    Upstream(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// transpose-common error
    #[error("Common error: {0}")]
    Common(#[from] transpose_common::Error),
}

impl From<TransposeError> for ApiError {
    fn from(err: TransposeError) -> Self {
        match err {
            TransposeError::Provider(provider_err) => provider_err.into(),
            TransposeError::NotFound(id) => {
                ApiError::NotFound(format!("Unknown transpose ID: {}", id))
            }
            TransposeError::NoMatches { needed, found } => ApiError::NotFound(format!(
                "Element matched on {} other provider(s), {} required",
                found, needed
            )),
            TransposeError::Collision(msg) => ApiError::Internal(msg),
            TransposeError::Database(err) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Parse(msg) => {
                ApiError::BadRequest(format!("Unsupported link: {}", msg))
            }
            ProviderError::NotFound(msg) => ApiError::NotFound(msg),
            ProviderError::Auth(msg) => ApiError::Upstream(msg),
            ProviderError::Fetch(msg) => ApiError::Upstream(msg),
            ProviderError::Search(msg) => ApiError::Upstream(msg),
            ProviderError::UnsupportedType(element_type) => {
                ApiError::BadRequest(format!("Unsupported element type: {}", element_type))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
