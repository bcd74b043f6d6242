//! Error types for llhe-api
//!
//! Every failure a handler can produce maps to one HTTP status. Wrapped
//! errors are mapped by kind, never by message text.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use llhe_common::ErrorKind;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::ai::{AiError, PiiDetection};
use crate::storage::StorageError;
use crate::validation::FieldError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Field validation failed (400)
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Submitted text contains personal information (400)
    #[error("Personal information detected")]
    PiiDetected(Vec<PiiDetection>),

    /// Authenticated but not allowed (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Request body over the configured limit (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// A required capability cannot serve the request (503)
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// llhe-common error
    #[error("Common error: {0}")]
    Common(#[from] llhe_common::Error),

    /// AI capability error
    #[error("AI error: {0}")]
    Ai(#[from] AiError),

    /// Media storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) | ApiError::Validation(_) | ApiError::PiiDetected(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Unavailable(_) | ApiError::Ai(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Common(err) => match err.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::Database | ErrorKind::Io | ErrorKind::Config | ErrorKind::Internal => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Storage(err) => match err {
                StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                StorageError::InvalidPath(_) => StatusCode::BAD_REQUEST,
                StorageError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::PiiDetected(_) => "PII_DETECTED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::Unavailable(_) | ApiError::Ai(_) => "SERVICE_UNAVAILABLE",
            ApiError::Storage(_) => "STORAGE_ERROR",
            _ => match self.status() {
                StatusCode::NOT_FOUND => "NOT_FOUND",
                StatusCode::BAD_REQUEST => "BAD_REQUEST",
                _ => "INTERNAL_ERROR",
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        if status.is_server_error() {
            error!(code, "{}", self);
        }

        // 500s never leak internals to the client
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut body = json!({
            "error": {
                "code": code,
                "message": message,
            }
        });

        match self {
            ApiError::Validation(fields) => body["details"] = json!(fields),
            ApiError::PiiDetected(detections) => body["detections"] = json!(detections),
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_errors_map_by_kind() {
        let not_found = ApiError::from(llhe_common::Error::NotFound("fragment".to_string()));
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let invalid = ApiError::from(llhe_common::Error::InvalidInput("visibility".to_string()));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let row = ApiError::from(llhe_common::Error::Database(sqlx::Error::RowNotFound));
        assert_eq!(row.status(), StatusCode::NOT_FOUND);

        let config = ApiError::from(llhe_common::Error::Config("bad".to_string()));
        assert_eq!(config.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_ai_errors_are_unavailable() {
        let err = ApiError::from(AiError::NotConfigured("Transcription"));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        let err = ApiError::from(AiError::Provider(400, "bad model".to_string()));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_codes() {
        assert_eq!(ApiError::Forbidden("x".into()).code(), "FORBIDDEN");
        assert_eq!(ApiError::PiiDetected(vec![]).code(), "PII_DETECTED");
        assert_eq!(ApiError::Database(sqlx::Error::RowNotFound).code(), "NOT_FOUND");
        assert_eq!(ApiError::Internal("x".into()).code(), "INTERNAL_ERROR");
    }
}
