//! Streaming over a real socket

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use vidhost_core::config::StreamingConfig;
use vidhost_core::storage::test_fixtures::{create_media_dir, write_sample_video};
use vidhost_core::{RangeMode, RangeStreamer, VideoLibrary};
use vidhost_web::{AppState, build_router};

struct RunningServer {
    _temp_dir: TempDir,
    addr: SocketAddr,
    state: AppState,
    handle: JoinHandle<()>,
}

impl RunningServer {
    async fn start(video_len: usize) -> (Self, Vec<u8>) {
        let (temp_dir, media_dir) = create_media_dir();
        let (_, data) = write_sample_video(&media_dir.join("3"), "feature.mp4", video_len);

        let library = Arc::new(VideoLibrary::new(&media_dir));
        library.scan_directory().await.unwrap();
        let streamer = RangeStreamer::new(&StreamingConfig {
            block_size: 8192,
            range_mode: RangeMode::Permissive,
        });
        let state = AppState::new(library, streamer);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = build_router(state.clone());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let server = Self {
            _temp_dir: temp_dir,
            addr,
            state,
            handle,
        };
        (server, data)
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Waits until every stream has released its file handle.
    async fn wait_for_release(&self) -> bool {
        for _ in 0..250 {
            if self.state.streamer.stats().open_handles() == 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn test_ranged_requests_over_tcp() {
    let (server, data) = RunningServer::start(64 * 1024).await;
    let client = reqwest::Client::new();

    let response = client
        .get(server.url("/videos/1/stream"))
        .header(header::RANGE, "bytes=1000-1999")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers()[header::CONTENT_RANGE],
        "bytes 1000-1999/65536"
    );
    assert_eq!(response.content_length(), Some(1000));
    assert_eq!(response.bytes().await.unwrap(), &data[1000..2000]);

    let response = client
        .get(server.url("/videos/1/stream"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(response.bytes().await.unwrap(), data);

    assert!(server.wait_for_release().await);
    let stats = server.state.streamer.snapshot();
    assert_eq!(stats.streams_completed, 2);
    assert_eq!(stats.streams_aborted, 0);
}

#[tokio::test]
async fn test_client_disconnect_releases_file_handle() {
    let (server, _) = RunningServer::start(16 * 1024 * 1024).await;
    let client = reqwest::Client::new();

    let mut response = client
        .get(server.url("/videos/1/stream"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let first = response.chunk().await.unwrap();
    assert!(first.is_some_and(|chunk| !chunk.is_empty()));
    assert_eq!(server.state.streamer.stats().open_handles(), 1);

    drop(response);
    drop(client);

    assert!(
        server.wait_for_release().await,
        "file handle still open after client disconnect"
    );
    let stats = server.state.streamer.snapshot();
    assert_eq!(stats.streams_aborted, 1);
    assert_eq!(stats.streams_completed, 0);
    assert!(stats.bytes_served < 16 * 1024 * 1024);
}

#[tokio::test]
async fn test_concurrent_clients_read_independent_windows() {
    let (server, data) = RunningServer::start(256 * 1024).await;
    let client = reqwest::Client::new();

    let fetch = |range: &'static str| {
        let request = client
            .get(server.url("/videos/1/stream"))
            .header(header::RANGE, range);
        async move { request.send().await.unwrap().bytes().await.unwrap() }
    };

    let (head, middle, tail) = tokio::join!(
        fetch("bytes=0-65535"),
        fetch("bytes=100000-150000"),
        fetch("bytes=200000-"),
    );

    assert_eq!(head, &data[..65536]);
    assert_eq!(middle, &data[100_000..=150_000]);
    assert_eq!(tail, &data[200_000..]);
    assert!(server.wait_for_release().await);
}
