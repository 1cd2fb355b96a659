//! Axum server wiring for Vidhost
//!
//! Builds the shared application state, the router and its layers, and runs
//! the listener until ctrl-c.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use vidhost_core::{RangeStreamer, VideoLibrary, VidhostConfig, VidhostError};

use crate::handlers::{api_stats, delete_video, get_video, list_videos, stream_video, upload_video};

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    /// Video catalog and upload storage
    pub library: Arc<VideoLibrary>,
    /// Opens stored files as ranged bodies
    pub streamer: RangeStreamer,
    /// When the state was created
    pub started_at: Instant,
}

impl AppState {
    /// Creates state over an existing library and streamer.
    pub fn new(library: Arc<VideoLibrary>, streamer: RangeStreamer) -> Self {
        Self {
            library,
            streamer,
            started_at: Instant::now(),
        }
    }
}

/// Builds the API router.
///
/// Upload size is capped by the library, which streams bodies to disk.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/videos", get(list_videos).post(upload_video))
        .route("/videos/{id}", get(get_video).delete(delete_video))
        .route("/videos/{id}/stream", get(stream_video))
        .route("/api/stats", get(api_stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Runs the HTTP server until ctrl-c.
///
/// # Errors
///
/// - `VidhostError::Configuration` - Listen address does not parse
/// - `VidhostError::Library` - Media directory cannot be scanned
/// - `VidhostError::Io` - Media directory cannot be created or the port cannot be bound
pub async fn run_server(config: VidhostConfig) -> Result<(), VidhostError> {
    let addr = config.server.socket_addr()?;

    tokio::fs::create_dir_all(&config.storage.media_dir).await?;
    let library = Arc::new(
        VideoLibrary::new(&config.storage.media_dir)
            .with_max_upload_bytes(config.storage.max_upload_bytes),
    );
    if config.storage.scan_on_startup {
        let count = library.scan_directory().await?;
        info!("Found {} videos in {}", count, library.media_dir().display());
    }

    let streamer = RangeStreamer::new(&config.streaming);
    info!(
        block_size = config.streaming.block_size,
        range_mode = ?streamer.range_mode(),
        "Range streamer ready"
    );

    let state = AppState::new(library, streamer);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Vidhost server running on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Vidhost server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
