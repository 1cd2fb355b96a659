//! Ranged video streaming handler

use axum::extract::{Path, State};
use axum::http::{HeaderMap, header};
use axum::response::Response;
use tracing::debug;
use vidhost_core::{VideoId, VideoLookup};

use crate::error::ApiError;
use crate::server::AppState;

/// Streams a stored video, honoring a single-range `Range` header.
///
/// # Errors
///
/// - `ApiError::Library` - Unknown video id (404)
/// - `ApiError::Streaming` - File vanished (404) or range not satisfiable in strict mode (416)
pub async fn stream_video(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let id = VideoId(id);
    let media = state.library.media_file(id).await?;
    let range = range_header(&headers);
    debug!(%id, range, "Streaming request");

    let descriptor = state.streamer.open(&media.path, range).await?;
    let content_type = mime_guess::from_path(&media.path).first_or_octet_stream();

    Ok(descriptor.into_response(content_type.essence_str()))
}

/// Raw `Range` header value, `None` when absent or not valid UTF-8.
pub fn range_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
}
