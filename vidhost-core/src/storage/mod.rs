//! Storage layer for uploaded videos.
//!
//! Resolves video ids to stored media files and persists new uploads under
//! the configured media directory.

pub mod video_library;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
pub use video_library::{NewVideo, VideoLibrary, VideoRecord};

/// Content type accepted for uploads.
pub const MP4_CONTENT_TYPE: &str = "video/mp4";

/// Catalog identifier of a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(pub u64);

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Already-persisted media file backing a video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub path: PathBuf,
    pub total_size: u64,
}

/// Resolves a video to the file that should be streamed for it.
#[async_trait]
pub trait VideoLookup: Send + Sync {
    /// Looks up the stored file for `id`.
    ///
    /// # Errors
    ///
    /// - `LibraryError::VideoNotFound` - No video with this id
    async fn media_file(&self, id: VideoId) -> Result<MediaFile, LibraryError>;
}

/// Errors from catalog and upload operations.
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("Video {id} not found")]
    VideoNotFound { id: VideoId },

    #[error("Unsupported media type: {content_type}")]
    UnsupportedMediaType { content_type: String },

    #[error("Upload body is empty")]
    EmptyUpload,

    #[error("Upload exceeds {limit} bytes")]
    UploadTooLarge { limit: u64 },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}
