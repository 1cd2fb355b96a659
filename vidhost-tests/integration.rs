//! Integration tests for Vidhost
//!
//! Drive the axum router in-process against files in temporary media
//! directories and verify the HTTP contract of uploads and ranged streams.

#[path = "integration/support.rs"]
mod support;

#[path = "integration/range_streaming.rs"]
mod range_streaming;

#[path = "integration/video_api.rs"]
mod video_api;
