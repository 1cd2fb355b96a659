//! Vidhost Core - ranged media streaming and video storage
//!
//! This crate provides the building blocks for serving uploaded videos over
//! HTTP: byte-range parsing, lazily chunked file streaming, the video
//! library that resolves ids to stored files, and configuration management.

pub mod config;
pub mod storage;
pub mod streaming;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::VidhostConfig;
pub use storage::{LibraryError, MediaFile, VideoId, VideoLibrary, VideoLookup, VideoRecord};
pub use streaming::{
    ByteRange, RangeMode, RangeStreamer, StreamDescriptor, StreamStats, StreamingError,
};

/// Core errors that can bubble up from any Vidhost subsystem.
#[derive(Debug, thiserror::Error)]
pub enum VidhostError {
    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Streaming error: {0}")]
    Streaming(#[from] StreamingError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VidhostError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            VidhostError::Library(LibraryError::VideoNotFound { id }) => {
                format!("Video {id} not found")
            }
            VidhostError::Library(LibraryError::UnsupportedMediaType { .. }) => {
                "File type must be mp4".to_string()
            }
            VidhostError::Library(LibraryError::EmptyUpload) => "Upload body is empty".to_string(),
            VidhostError::Library(LibraryError::UploadTooLarge { limit }) => {
                format!("Upload exceeds {limit} bytes")
            }
            VidhostError::Library(LibraryError::Io(_)) => "Storage error occurred".to_string(),
            VidhostError::Streaming(e) if e.is_gone() => "Video file is gone".to_string(),
            VidhostError::Streaming(StreamingError::RangeNotSatisfiable { total_size }) => {
                format!("Range not satisfiable for a {total_size}-byte file")
            }
            VidhostError::Streaming(_) => "Streaming error occurred".to_string(),
            VidhostError::Configuration { reason } => format!("Configuration error: {reason}"),
            VidhostError::Io(e) => format!("I/O error: {e}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, VidhostError>;

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_user_messages() {
        let gone = VidhostError::from(StreamingError::FileNotFound {
            path: PathBuf::from("videos/1/missing.mp4"),
        });
        assert_eq!(gone.user_message(), "Video file is gone");

        let unsatisfiable = VidhostError::from(StreamingError::RangeNotSatisfiable {
            total_size: 1000,
        });
        assert_eq!(
            unsatisfiable.user_message(),
            "Range not satisfiable for a 1000-byte file"
        );

        let media = VidhostError::from(LibraryError::UnsupportedMediaType {
            content_type: "text/plain".to_string(),
        });
        assert_eq!(media.user_message(), "File type must be mp4");

        let bind = VidhostError::from(std::io::Error::from(std::io::ErrorKind::AddrInUse));
        assert!(bind.user_message().starts_with("I/O error: "));
    }
}
