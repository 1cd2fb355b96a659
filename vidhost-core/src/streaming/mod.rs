//! Ranged media streaming.
//!
//! Turns a stored file plus an optional `Range` header into an HTTP-ready
//! [`StreamDescriptor`]: status, exact content length, range headers, and a
//! body that reads the file block by block instead of loading it whole.

pub mod chunks;
pub mod range;
pub mod range_streamer;
pub mod stats;

use std::path::{Path, PathBuf};

pub use chunks::ChunkStream;
pub use range::{ByteRange, RangeDecision, RangeMode, resolve_range};
pub use range_streamer::{RangeStreamer, StreamDescriptor};
pub use stats::{StreamStats, StreamStatsSnapshot};

/// Errors raised while opening a media stream.
///
/// Malformed ranges and short files are recovered locally and never surface
/// here; every variant is scoped to the single request that triggered it.
#[derive(Debug, thiserror::Error)]
pub enum StreamingError {
    #[error("Media file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Media file unreadable: {}: {source}", path.display())]
    FileUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Range not satisfiable for {total_size} byte resource")]
    RangeNotSatisfiable { total_size: u64 },

    #[error("I/O error while positioning stream: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamingError {
    /// Classifies a failed `open` call.
    pub(crate) fn from_open(path: &Path, error: std::io::Error) -> Self {
        if error.kind() == std::io::ErrorKind::NotFound {
            StreamingError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            StreamingError::FileUnreadable {
                path: path.to_path_buf(),
                source: error,
            }
        }
    }

    /// True when the stored file vanished or cannot be read, which callers
    /// report the same way as an unknown video.
    pub fn is_gone(&self) -> bool {
        matches!(
            self,
            StreamingError::FileNotFound { .. } | StreamingError::FileUnreadable { .. }
        )
    }
}

pub type StreamingResult<T> = Result<T, StreamingError>;
