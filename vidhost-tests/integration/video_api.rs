//! Upload and catalog routes

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use vidhost_core::RangeMode;
use vidhost_core::storage::test_fixtures::sample_bytes;

use crate::support::{TestApp, body_bytes, body_json, header_str};

fn upload_request(query: &str, content_type: &str, body: Vec<u8>) -> Request<Body> {
    Request::post(format!("/videos?{query}"))
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_upload_then_stream_back() {
    let app = TestApp::new(RangeMode::Permissive);
    let data = sample_bytes(4096);

    let response = app
        .send(upload_request(
            "title=Holiday&description=beach&author_id=7",
            "video/mp4",
            data.clone(),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let record = body_json(response).await;
    assert_eq!(record["title"], "Holiday");
    assert_eq!(record["description"], "beach");
    assert_eq!(record["author_id"], 7);
    assert_eq!(record["size"], 4096);

    let stored = record["file"].as_str().unwrap();
    assert!(stored.starts_with(app.media_dir.join("7").to_str().unwrap()));
    assert!(stored.ends_with(".mp4"));

    let id = record["id"].as_u64().unwrap();
    let response = app.stream(id, Some("bytes=1024-2047")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header_str(&response, header::CONTENT_RANGE),
        Some("bytes 1024-2047/4096")
    );
    assert_eq!(body_bytes(response).await, &data[1024..2048]);
}

#[tokio::test]
async fn test_upload_rejects_non_mp4() {
    let app = TestApp::new(RangeMode::Permissive);

    let response = app
        .send(upload_request(
            "title=Notes&author_id=1",
            "text/plain",
            b"not a video".to_vec(),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body_json(response).await["detail"], "File type must be mp4");
    assert!(app.state.library.is_empty());
}

#[tokio::test]
async fn test_upload_rejects_empty_body_and_blank_title() {
    let app = TestApp::new(RangeMode::Permissive);

    let response = app
        .send(upload_request("title=Empty&author_id=1", "video/mp4", Vec::new()))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(upload_request("title=%20&author_id=1", "video/mp4", vec![1, 2, 3]))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.state.library.is_empty());
}

#[tokio::test]
async fn test_list_get_and_delete() {
    let app = TestApp::new(RangeMode::Permissive);
    let (id, _) = app.with_video(512).await;

    let response = app
        .send(Request::get("/videos").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let videos = body_json(response).await;
    assert_eq!(videos.as_array().unwrap().len(), 1);
    assert_eq!(videos[0]["title"], "clip");
    assert_eq!(videos[0]["author_id"], 1);

    let response = app
        .send(Request::get(format!("/videos/{id}")).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["size"], 512);

    let response = app
        .send(Request::delete(format!("/videos/{id}")).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(Request::get(format!("/videos/{id}")).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.stream(id, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stats_report_mode_and_counters() {
    let app = TestApp::new(RangeMode::Strict);
    let (id, _) = app.with_video(300).await;
    body_bytes(app.stream(id, Some("bytes=0-9")).await).await;

    let response = app
        .send(Request::get("/api/stats").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let stats = body_json(response).await;
    assert_eq!(stats["videos"], 1);
    assert_eq!(stats["range_mode"], "strict");
    assert_eq!(stats["streams"]["streams_opened"], 1);
    assert_eq!(stats["streams"]["bytes_served"], 10);
    assert_eq!(stats["streams"]["open_handles"], 0);
}
