//! HTTP request handlers organized by functionality

pub mod api;
pub mod streaming;
pub mod videos;

// Re-export handler functions
pub use api::{StatsResponse, api_stats};
pub use streaming::{range_header, stream_video};
pub use videos::{UploadQuery, delete_video, get_video, list_videos, upload_video};
