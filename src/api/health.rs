//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::connection_manager::{RoomInfo, StatsSnapshot};
use crate::ratelimit::RateLimiterStats;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub connections: StatsSnapshot,
    pub sessions: usize,
    pub rooms: Vec<RoomInfo>,
    pub rate_limiter: RateLimiterStats,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        connections: state.hub.stats(),
        sessions: state.hub.sessions().len(),
        rooms: state.connection_manager.list_rooms(),
        rate_limiter: state.hub.rate_limiter().stats(),
    })
}
