//! Shared setup for router-level tests

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, header};
use tempfile::TempDir;
use tower::ServiceExt;
use vidhost_core::config::StreamingConfig;
use vidhost_core::storage::test_fixtures::{create_media_dir, write_sample_video};
use vidhost_core::{RangeMode, RangeStreamer, VideoLibrary};
use vidhost_web::{AppState, build_router};

/// Router over a temporary media directory.
pub struct TestApp {
    _temp_dir: TempDir,
    pub media_dir: PathBuf,
    pub state: AppState,
}

impl TestApp {
    pub fn new(range_mode: RangeMode) -> Self {
        let (temp_dir, media_dir) = create_media_dir();
        let config = StreamingConfig {
            block_size: 256,
            range_mode,
        };
        let state = AppState::new(
            Arc::new(VideoLibrary::new(&media_dir)),
            RangeStreamer::new(&config),
        );

        Self {
            _temp_dir: temp_dir,
            media_dir,
            state,
        }
    }

    /// Writes a sample file for author 1, indexes it and returns its id and content.
    pub async fn with_video(&self, len: usize) -> (u64, Vec<u8>) {
        let (path, data) = write_sample_video(&self.media_dir.join("1"), "clip.mp4", len);
        self.state.library.scan_directory().await.unwrap();

        let id = self
            .state
            .library
            .list()
            .into_iter()
            .find(|record| record.file == path)
            .map(|record| record.id.0)
            .unwrap();
        (id, data)
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.unwrap()
    }

    pub async fn stream(&self, id: u64, range: Option<&str>) -> Response<Body> {
        let mut request = Request::get(format!("/videos/{id}/stream"));
        if let Some(range) = range {
            request = request.header(header::RANGE, range);
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn header_str<'a>(response: &'a Response<Body>, name: header::HeaderName) -> Option<&'a str> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
}
