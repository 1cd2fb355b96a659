//! In-memory video catalog backed by files in the media directory

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{LibraryError, MP4_CONTENT_TYPE, MediaFile, VideoId, VideoLookup};
use crate::config::DEFAULT_MAX_UPLOAD_BYTES;

/// Catalog entry for a stored video
#[derive(Debug, Clone, Serialize)]
pub struct VideoRecord {
    pub id: VideoId,
    pub title: String,
    pub description: String,
    pub author_id: u64,
    /// Stored media file
    pub file: PathBuf,
    /// File size in bytes when registered
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// Metadata supplied with an upload
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub title: String,
    pub description: String,
    pub author_id: u64,
    /// Declared content type of the uploaded body
    pub content_type: String,
}

/// Catalog of uploaded videos.
///
/// Uploads are streamed to `{media_dir}/{author_id}/{uuid}.mp4`. Removing a
/// video only drops the catalog entry; the stored file stays on disk.
#[derive(Debug)]
pub struct VideoLibrary {
    media_dir: PathBuf,
    max_upload_bytes: u64,
    videos: RwLock<HashMap<VideoId, VideoRecord>>,
    next_id: AtomicU64,
}

impl VideoLibrary {
    /// Create an empty library rooted at `media_dir`
    pub fn new(media_dir: impl Into<PathBuf>) -> Self {
        Self {
            media_dir: media_dir.into(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            videos: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Caps the size of a single upload body.
    pub fn with_max_upload_bytes(mut self, limit: u64) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    /// Root directory for stored files
    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// Stream an uploaded MP4 to disk and register it.
    ///
    /// The body is written chunk by chunk as it arrives. A rejected or failed
    /// upload leaves no file behind.
    ///
    /// # Errors
    /// - `LibraryError::UnsupportedMediaType` - Content type is not `video/mp4`
    /// - `LibraryError::EmptyUpload` - Body carried no bytes
    /// - `LibraryError::UploadTooLarge` - Body exceeded the upload limit
    /// - `LibraryError::Io` - Directory creation, body read or file write failed
    pub async fn save_upload<S, E>(
        &self,
        video: NewVideo,
        body: S,
    ) -> Result<VideoRecord, LibraryError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        if !is_mp4(&video.content_type) {
            return Err(LibraryError::UnsupportedMediaType {
                content_type: video.content_type,
            });
        }

        let author_dir = self.media_dir.join(video.author_id.to_string());
        tokio::fs::create_dir_all(&author_dir).await?;
        let file = author_dir.join(format!("{}.mp4", Uuid::new_v4()));

        let size = match self.write_upload(&file, body).await {
            Ok(size) => size,
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&file).await
                    && remove_err.kind() != std::io::ErrorKind::NotFound
                {
                    warn!(
                        "Failed to remove partial upload {}: {}",
                        file.display(),
                        remove_err
                    );
                }
                return Err(e);
            }
        };

        let record = VideoRecord {
            id: self.allocate_id(),
            title: video.title,
            description: video.description,
            author_id: video.author_id,
            file,
            size,
            created_at: Utc::now(),
        };

        info!(
            id = %record.id,
            author_id = record.author_id,
            size = record.size,
            file = %record.file.display(),
            "Stored uploaded video"
        );
        self.videos.write().insert(record.id, record.clone());

        Ok(record)
    }

    /// Index existing MP4 files under the media directory.
    ///
    /// Files inside a numeric directory are attributed to that author id,
    /// everything else to author 0. Returns the number of files added.
    ///
    /// # Errors
    /// - `LibraryError::Io` - The media directory cannot be read
    pub async fn scan_directory(&self) -> Result<usize, LibraryError> {
        let mut found = Vec::new();
        collect_mp4_files(&self.media_dir, &mut found).await?;

        let known: Vec<PathBuf> = self
            .videos
            .read()
            .values()
            .map(|record| record.file.clone())
            .collect();

        let mut added = 0;
        for (file, size) in found {
            if known.contains(&file) {
                continue;
            }
            let record = self.record_from_path(file, size);
            debug!(id = %record.id, file = %record.file.display(), "Indexed existing video");
            self.videos.write().insert(record.id, record);
            added += 1;
        }

        info!(
            "Indexed {} existing videos in {}",
            added,
            self.media_dir.display()
        );
        Ok(added)
    }

    /// Find video by id
    pub fn get(&self, id: VideoId) -> Option<VideoRecord> {
        self.videos.read().get(&id).cloned()
    }

    /// All videos ordered by id
    pub fn list(&self) -> Vec<VideoRecord> {
        let mut videos: Vec<VideoRecord> = self.videos.read().values().cloned().collect();
        videos.sort_by_key(|record| record.id);
        videos
    }

    /// Drop a video from the catalog
    ///
    /// # Errors
    /// - `LibraryError::VideoNotFound` - No video with this id
    pub fn remove(&self, id: VideoId) -> Result<VideoRecord, LibraryError> {
        self.videos
            .write()
            .remove(&id)
            .ok_or(LibraryError::VideoNotFound { id })
    }

    pub fn len(&self) -> usize {
        self.videos.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.read().is_empty()
    }

    async fn write_upload<S, E>(&self, path: &Path, body: S) -> Result<u64, LibraryError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let mut output = tokio::fs::File::create(path).await?;
        let mut body = std::pin::pin!(body);
        let mut size = 0u64;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| LibraryError::Io(std::io::Error::other(e)))?;
            size += chunk.len() as u64;
            if size > self.max_upload_bytes {
                return Err(LibraryError::UploadTooLarge {
                    limit: self.max_upload_bytes,
                });
            }
            output.write_all(&chunk).await?;
        }

        if size == 0 {
            return Err(LibraryError::EmptyUpload);
        }
        output.flush().await?;
        Ok(size)
    }

    fn allocate_id(&self) -> VideoId {
        VideoId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn record_from_path(&self, file: PathBuf, size: u64) -> VideoRecord {
        let title = file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Untitled")
            .replace(['.', '_'], " ");
        let author_id = file
            .parent()
            .and_then(|dir| dir.file_name())
            .and_then(|name| name.to_str())
            .and_then(|name| name.parse().ok())
            .unwrap_or(0);

        VideoRecord {
            id: self.allocate_id(),
            title,
            description: String::new(),
            author_id,
            file,
            size,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl VideoLookup for VideoLibrary {
    async fn media_file(&self, id: VideoId) -> Result<MediaFile, LibraryError> {
        self.get(id)
            .map(|record| MediaFile {
                path: record.file,
                total_size: record.size,
            })
            .ok_or(LibraryError::VideoNotFound { id })
    }
}

/// Accepts `video/mp4`, ignoring case and parameters.
fn is_mp4(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(MP4_CONTENT_TYPE))
}

fn collect_mp4_files<'a>(
    dir: &'a Path,
    found: &'a mut Vec<(PathBuf, u64)>,
) -> Pin<Box<dyn Future<Output = Result<(), std::io::Error>> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = tokio::fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = entry.metadata().await?;

            if metadata.is_dir() {
                if let Err(e) = collect_mp4_files(&path, found).await {
                    warn!("Failed to scan {}: {}", path.display(), e);
                }
            } else if metadata.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"))
            {
                found.push((path, metadata.len()));
            }
        }

        Ok(())
    })
}
