//! Error types for the HTTP API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::classifier::ClassificationError;
use crate::engine::SubmitError;
use crate::validator::ValidationError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Malformed request parameters (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Submission failed a validation rule (422)
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Classifier failed, timed out or was cancelled (503)
    #[error(transparent)]
    ClassificationUnavailable(#[from] ClassificationError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// bfly-common error
    #[error("Common error: {0}")]
    Common(#[from] bfly_common::Error),
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::ClassificationUnavailable(e) => ApiError::ClassificationUnavailable(e),
            SubmitError::Validation(e) => ApiError::Validation(e),
            SubmitError::Journal(e) => ApiError::Common(e),
            SubmitError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Validation(ref err) => {
                (StatusCode::UNPROCESSABLE_ENTITY, err.code(), err.to_string())
            }
            ApiError::ClassificationUnavailable(ref err) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "CLASSIFICATION_UNAVAILABLE",
                err.to_string(),
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let validation: ApiError = SubmitError::Validation(ValidationError::MissingSubmitter).into();
        assert_eq!(validation.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);

        let unavailable: ApiError = SubmitError::ClassificationUnavailable(ClassificationError::Cancelled).into();
        assert_eq!(unavailable.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

        let aborted: ApiError = SubmitError::Internal("task aborted".to_string()).into();
        assert_eq!(aborted.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let missing = ApiError::NotFound("hotspot".to_string());
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);
    }
}
