use axum::{
    Json,
    extract::multipart::MultipartRejection,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing input. Raised before any side effect.
    #[error("{0}")]
    Validation(String),

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Invalid token")]
    InvalidSession,

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Forbidden")]
    Forbidden,

    #[error("Message not found")]
    MessageNotFound,

    /// Unknown, wrong, expired and already-used tokens all look the same.
    #[error("Invalid or expired token")]
    TokenNotFound,

    #[error("Message does not have a downloadable video")]
    NoArtifact,

    #[error("Upload failed: {0}")]
    UploadFailed(anyhow::Error),

    #[error("Storage error: {0}")]
    Storage(anyhow::Error),

    #[error("Cryptographic error: {0}")]
    Crypto(anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::NoArtifact => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated | ApiError::InvalidSession | ApiError::InvalidPassword => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::MessageNotFound | ApiError::TokenNotFound => StatusCode::NOT_FOUND,
            ApiError::UploadFailed(_)
            | ApiError::Storage(_)
            | ApiError::Crypto(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Dependency failures are logged in full and reported generically.
        let message = match &self {
            ApiError::UploadFailed(e) => {
                error!("Upload failed: {:#}", e);
                "Unable to upload video card. Please try again later".to_string()
            }
            ApiError::Storage(e) => {
                error!("Storage error: {:#}", e);
                "Internal server error".to_string()
            }
            ApiError::Crypto(e) => {
                error!("Crypto error: {:#}", e);
                "Internal server error".to_string()
            }
            ApiError::Internal(e) => {
                error!("Internal error: {}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorResponse {
                success: false,
                error: message,
            }),
        )
            .into_response()
    }
}

// Extractor rejections are client errors; render them in the same
// `{success, error}` shape as everything else.

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

/// Trimmed value of a required text field, or a validation error naming it.
pub fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::Validation(format!("{} is required", field))),
    }
}

/// Optional text field; blank counts as absent.
pub fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
