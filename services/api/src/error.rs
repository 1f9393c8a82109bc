//! Custom error types for the API service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use media::UploadError;
use media::database::VideoStoreError;
use media::object_store::SignError;
use media::staging::StagingError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or invalid credentials, or a caller acting on a video they do not own
    #[error("Unauthorized")]
    Unauthorized,

    /// Bad request with message
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upload exceeds the {0} byte limit")]
    PayloadTooLarge(u64),

    /// Internal server error; the cause has already been logged
    #[error("Internal server error")]
    InternalServerError,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] common::error::DatabaseError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::PayloadTooLarge(limit) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Upload exceeds the {} byte limit", limit),
            ),
            ApiError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
            ApiError::Database(e) => {
                error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<VideoStoreError> for ApiError {
    fn from(e: VideoStoreError) -> Self {
        match e {
            VideoStoreError::Database(e) => ApiError::Database(e),
            VideoStoreError::Missing(id) => ApiError::NotFound(format!("Video {} not found", id)),
        }
    }
}

impl From<SignError> for ApiError {
    fn from(e: SignError) -> Self {
        error!("Failed to sign playback URL: {}", e);
        ApiError::InternalServerError
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::NotOwner { .. } => ApiError::Unauthorized,
            UploadError::VideoNotFound(id) => ApiError::NotFound(format!("Video {} not found", id)),
            UploadError::UnsupportedMediaType(content_type) => ApiError::BadRequest(format!(
                "Unsupported content type {:?}, expected video/mp4",
                content_type
            )),
            UploadError::Staging(StagingError::TooLarge { limit }) => ApiError::PayloadTooLarge(limit),
            other => {
                error!(stage = %other.stage(), "Video upload failed: {}", other);
                ApiError::InternalServerError
            }
        }
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
