//! Error types for tenx-api
//!
//! Every handler returns [`ApiResult`]; errors render as
//! `{"error": {"code": "...", "message": "..."}}` with validation failures
//! adding a `details` list of field messages.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Single field validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Request body failed field validation (422)
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Missing or invalid credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Conflict (409) - e.g., duplicate email, import already running
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Request body exceeds the configured limit (413)
    #[error("Payload too large")]
    PayloadTooLarge,

    /// Request body is not JSON (415)
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Client exceeded its rate limit (429)
    #[error("Too many requests")]
    TooManyRequests { retry_after_secs: u64 },

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// tenx-common error
    #[error("Common error: {0}")]
    Common(#[from] tenx_common::Error),
}

impl ApiError {
    /// Validation error for a single field
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation(vec![FieldError {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Database(e) | ApiError::Common(tenx_common::Error::Database(e)) if is_unique_violation(e) => {
                StatusCode::CONFLICT
            }
            ApiError::Common(tenx_common::Error::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Common(tenx_common::Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_)
            | ApiError::Database(_)
            | ApiError::Other(_)
            | ApiError::Common(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (error_code, message) = match &self {
            ApiError::BadRequest(msg) => ("BAD_REQUEST", msg.clone()),
            ApiError::Validation(_) => ("VALIDATION_ERROR", "Validation failed".to_string()),
            ApiError::Unauthorized(msg) => ("UNAUTHORIZED", msg.clone()),
            ApiError::Forbidden(msg) => ("FORBIDDEN", msg.clone()),
            ApiError::NotFound(msg) => ("NOT_FOUND", msg.clone()),
            ApiError::Conflict(msg) => ("CONFLICT", msg.clone()),
            ApiError::PayloadTooLarge => ("PAYLOAD_TOO_LARGE", "Request body is too large".to_string()),
            ApiError::UnsupportedMediaType(msg) => ("UNSUPPORTED_MEDIA_TYPE", msg.clone()),
            ApiError::TooManyRequests { .. } => (
                "RATE_LIMITED",
                "Too many requests, please try again later".to_string(),
            ),
            ApiError::Database(e) | ApiError::Common(tenx_common::Error::Database(e)) if is_unique_violation(e) => {
                ("CONFLICT", "Resource already exists".to_string())
            }
            ApiError::Common(tenx_common::Error::NotFound(msg)) => ("NOT_FOUND", msg.clone()),
            ApiError::Common(tenx_common::Error::InvalidInput(msg)) => ("BAD_REQUEST", msg.clone()),
            ApiError::Internal(_) | ApiError::Database(_) | ApiError::Other(_) | ApiError::Common(_) => {
                // Details stay in the log, not in the response
                error!("Internal error: {}", self);
                ("INTERNAL_ERROR", "Internal server error".to_string())
            }
        };

        let body = match &self {
            ApiError::Validation(details) => json!({
                "error": {
                    "code": error_code,
                    "message": message,
                    "details": details,
                }
            }),
            _ => json!({
                "error": {
                    "code": error_code,
                    "message": message,
                }
            }),
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::TooManyRequests { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::field("title", "required").status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            ApiError::Common(tenx_common::Error::NotFound("x".into())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Database(sqlx::Error::RowNotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rate_limited_response_has_retry_after() {
        let response = ApiError::TooManyRequests { retry_after_secs: 7 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "7");
    }
}
