//! Mapping of core errors onto HTTP responses

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::{error, warn};
use vidhost_core::{LibraryError, StreamingError};

/// Errors returned by API handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Catalog or upload failure
    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    /// Stream could not be opened
    #[error("Streaming error: {0}")]
    Streaming(#[from] StreamingError),

    /// Request rejected before reaching the library
    #[error("Invalid request: {reason}")]
    InvalidRequest {
        /// What was wrong with the request
        reason: String,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::Library(LibraryError::VideoNotFound { .. }) => {
                (StatusCode::NOT_FOUND, "Video not found".to_string())
            }
            ApiError::Library(LibraryError::UnsupportedMediaType { .. }) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "File type must be mp4".to_string(),
            ),
            ApiError::Library(LibraryError::EmptyUpload) => {
                (StatusCode::BAD_REQUEST, "Upload body is empty".to_string())
            }
            ApiError::Library(LibraryError::UploadTooLarge { limit }) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Upload exceeds {limit} bytes"),
            ),
            ApiError::Library(LibraryError::Io(e)) => {
                error!("Storage failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Storage error".to_string(),
                )
            }
            ApiError::Streaming(e) if e.is_gone() => {
                warn!("Stored video file is gone: {}", e);
                (StatusCode::NOT_FOUND, "Video file not found".to_string())
            }
            ApiError::Streaming(StreamingError::RangeNotSatisfiable { total_size }) => {
                return range_not_satisfiable(*total_size);
            }
            ApiError::Streaming(e) => {
                error!("Failed to open stream: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Streaming error".to_string(),
                )
            }
            ApiError::InvalidRequest { reason } => (StatusCode::BAD_REQUEST, reason.clone()),
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

fn range_not_satisfiable(total_size: u64) -> Response {
    let content_range = HeaderValue::from_str(&format!("bytes */{total_size}"))
        .unwrap_or_else(|_| HeaderValue::from_static("bytes */0"));

    (
        StatusCode::RANGE_NOT_SATISFIABLE,
        [
            (header::CONTENT_RANGE, content_range),
            (header::ACCEPT_RANGES, HeaderValue::from_static("bytes")),
        ],
        Json(json!({ "detail": "Range not satisfiable" })),
    )
        .into_response()
}
