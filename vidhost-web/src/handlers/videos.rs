//! Upload and catalog handlers

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Json;
use serde::Deserialize;
use tracing::info;
use vidhost_core::storage::NewVideo;
use vidhost_core::{VideoId, VideoRecord};

use crate::error::ApiError;
use crate::server::AppState;

/// Metadata for `POST /videos`; the request body is the raw MP4.
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// Video title
    pub title: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Uploading user, supplied by the authentication layer in front of us
    pub author_id: u64,
}

/// Streams an uploaded MP4 to disk and registers it in the catalog.
///
/// # Errors
///
/// - `ApiError::InvalidRequest` - Blank title
/// - `ApiError::Library` - Content type is not `video/mp4` (415), body empty (400),
///   body over the upload limit (413), or the write failed
pub async fn upload_video(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<(StatusCode, Json<VideoRecord>), ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if query.title.trim().is_empty() {
        return Err(ApiError::InvalidRequest {
            reason: "title must not be empty".to_string(),
        });
    }

    let record = state
        .library
        .save_upload(
            NewVideo {
                title: query.title,
                description: query.description,
                author_id: query.author_id,
                content_type,
            },
            body.into_data_stream(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// Lists all videos.
pub async fn list_videos(State(state): State<AppState>) -> Json<Vec<VideoRecord>> {
    Json(state.library.list())
}

/// Returns one video's metadata.
///
/// # Errors
///
/// - `ApiError::Library` - Unknown video id (404)
pub async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<VideoRecord>, ApiError> {
    let id = VideoId(id);
    state
        .library
        .get(id)
        .map(Json)
        .ok_or_else(|| ApiError::from(vidhost_core::LibraryError::VideoNotFound { id }))
}

/// Removes a video from the catalog.
///
/// # Errors
///
/// - `ApiError::Library` - Unknown video id (404)
pub async fn delete_video(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    let record = state.library.remove(VideoId(id))?;
    info!(id = %record.id, "Removed video from catalog");
    Ok(StatusCode::NO_CONTENT)
}
