//! Ranged streaming through the HTTP router

use axum::http::{StatusCode, header};
use vidhost_core::RangeMode;

use crate::support::{TestApp, body_bytes, body_json, header_str};

const VIDEO_SIZE: usize = 1000;

#[tokio::test]
async fn test_stream_without_range_returns_whole_file() {
    let app = TestApp::new(RangeMode::Permissive);
    let (id, data) = app.with_video(VIDEO_SIZE).await;

    let response = app.stream(id, None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, header::CONTENT_TYPE), Some("video/mp4"));
    assert_eq!(header_str(&response, header::CONTENT_LENGTH), Some("1000"));
    assert_eq!(header_str(&response, header::ACCEPT_RANGES), Some("bytes"));
    assert!(response.headers().get(header::CONTENT_RANGE).is_none());
    assert_eq!(body_bytes(response).await, data);
}

#[tokio::test]
async fn test_stream_bounded_range() {
    let app = TestApp::new(RangeMode::Permissive);
    let (id, data) = app.with_video(VIDEO_SIZE).await;

    let response = app.stream(id, Some("bytes=0-99")).await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header_str(&response, header::CONTENT_RANGE),
        Some("bytes 0-99/1000")
    );
    assert_eq!(header_str(&response, header::CONTENT_LENGTH), Some("100"));
    assert_eq!(body_bytes(response).await, &data[..100]);
}

#[tokio::test]
async fn test_stream_open_ended_range() {
    let app = TestApp::new(RangeMode::Permissive);
    let (id, data) = app.with_video(VIDEO_SIZE).await;

    let response = app.stream(id, Some("bytes=500-")).await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header_str(&response, header::CONTENT_RANGE),
        Some("bytes 500-999/1000")
    );
    assert_eq!(body_bytes(response).await, &data[500..]);
}

#[tokio::test]
async fn test_stream_end_past_file_is_clamped() {
    let app = TestApp::new(RangeMode::Permissive);
    let (id, data) = app.with_video(VIDEO_SIZE).await;

    let response = app.stream(id, Some("bytes=900-5000")).await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header_str(&response, header::CONTENT_RANGE),
        Some("bytes 900-999/1000")
    );
    assert_eq!(body_bytes(response).await, &data[900..]);
}

#[tokio::test]
async fn test_stream_lone_start_runs_to_end() {
    let app = TestApp::new(RangeMode::Permissive);
    let (id, data) = app.with_video(VIDEO_SIZE).await;

    let response = app.stream(id, Some("bytes=12")).await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header_str(&response, header::CONTENT_RANGE),
        Some("bytes 12-999/1000")
    );
    assert_eq!(body_bytes(response).await, &data[12..]);
}

#[tokio::test]
async fn test_stream_malformed_range_serves_whole_file() {
    let app = TestApp::new(RangeMode::Permissive);
    let (id, data) = app.with_video(VIDEO_SIZE).await;

    for range in ["bytes=abc-def", "garbage", "bytes=10-x"] {
        let response = app.stream(id, Some(range)).await;
        assert_eq!(response.status(), StatusCode::OK, "range {range:?}");
        assert_eq!(body_bytes(response).await, data, "range {range:?}");
    }
}

#[tokio::test]
async fn test_stream_suffix_range_by_mode() {
    let permissive = TestApp::new(RangeMode::Permissive);
    let (id, data) = permissive.with_video(VIDEO_SIZE).await;
    let response = permissive.stream(id, Some("bytes=-100")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header_str(&response, header::CONTENT_RANGE),
        Some("bytes 0-999/1000")
    );
    assert_eq!(body_bytes(response).await, data);

    let strict = TestApp::new(RangeMode::Strict);
    let (id, data) = strict.with_video(VIDEO_SIZE).await;
    let response = strict.stream(id, Some("bytes=-100")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header_str(&response, header::CONTENT_RANGE),
        Some("bytes 900-999/1000")
    );
    assert_eq!(body_bytes(response).await, &data[900..]);
}

#[tokio::test]
async fn test_strict_mode_rejects_unsatisfiable_range() {
    let app = TestApp::new(RangeMode::Strict);
    let (id, _) = app.with_video(VIDEO_SIZE).await;

    let response = app.stream(id, Some("bytes=5000-")).await;

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(
        header_str(&response, header::CONTENT_RANGE),
        Some("bytes */1000")
    );
    assert_eq!(header_str(&response, header::ACCEPT_RANGES), Some("bytes"));
    assert_eq!(app.state.streamer.stats().open_handles(), 0);
}

#[tokio::test]
async fn test_stream_unknown_video_is_not_found() {
    let app = TestApp::new(RangeMode::Permissive);

    let response = app.stream(42, Some("bytes=0-99")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["detail"], "Video not found");
}

#[tokio::test]
async fn test_stream_file_removed_from_disk_is_not_found() {
    let app = TestApp::new(RangeMode::Permissive);
    let (id, _) = app.with_video(VIDEO_SIZE).await;
    let record = app.state.library.get(vidhost_core::VideoId(id)).unwrap();
    std::fs::remove_file(&record.file).unwrap();

    let response = app.stream(id, None).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["detail"], "Video file not found");
}

#[tokio::test]
async fn test_completed_streams_release_handles() {
    let app = TestApp::new(RangeMode::Permissive);
    let (id, _) = app.with_video(VIDEO_SIZE).await;

    for range in [None, Some("bytes=0-99"), Some("bytes=250-")] {
        let response = app.stream(id, range).await;
        body_bytes(response).await;
    }

    let stats = app.state.streamer.snapshot();
    assert_eq!(stats.streams_opened, 3);
    assert_eq!(stats.streams_completed, 3);
    assert_eq!(stats.open_handles, 0);
    assert_eq!(stats.bytes_served, 1000 + 100 + 750);
}
