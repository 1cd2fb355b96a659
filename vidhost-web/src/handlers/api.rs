//! Service statistics

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use vidhost_core::streaming::{RangeMode, StreamStatsSnapshot};

use crate::server::AppState;

/// Body of `GET /api/stats`
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Videos in the catalog
    pub videos: usize,
    /// Range interpretation in effect
    pub range_mode: RangeMode,
    /// Stream lifecycle counters
    pub streams: StreamStatsSnapshot,
    /// Seconds since the server state was created
    pub uptime_secs: u64,
}

/// Reports catalog size and stream counters, including short reads.
pub async fn api_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        videos: state.library.len(),
        range_mode: state.streamer.range_mode(),
        streams: state.streamer.snapshot(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}
