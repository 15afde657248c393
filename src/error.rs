/// Unified error types for the Rollcall server
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single field-level validation failure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Main error type for the server
#[derive(Error, Debug)]
pub enum ApiError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Malformed or out-of-range input, with field-level detail
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Missing/invalid/expired token, or deactivated account
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Valid caller lacking the required role
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Referenced user or record absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate check-in, duplicate check-out, duplicate email
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unexpected internal failures
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Shortcut for a single-field validation failure
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation(vec![FieldError::new(field, message)])
    }
}

/// Error response body: `{success:false, message, errors?}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

/// Convert ApiError to HTTP response
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, errors) = match self {
            ApiError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                Some(errors),
            ),
            ApiError::Authentication(_) => (StatusCode::UNAUTHORIZED, self.to_string(), None),
            ApiError::Authorization(_) => (StatusCode::FORBIDDEN, self.to_string(), None),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string(), None),
            // Conflicts surface as 400 with a descriptive message; the caller
            // treats them as idempotent rejections
            ApiError::Conflict(_) => (StatusCode::BAD_REQUEST, self.to_string(), None),
            ApiError::Database(_) | ApiError::Internal(_) | ApiError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(), // Don't leak details
                None,
            ),
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
            errors,
        });

        (status, body).into_response()
    }
}

/// Result type alias for server operations
pub type ApiResult<T> = Result<T, ApiError>;
