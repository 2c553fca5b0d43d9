//! Prometheus metrics endpoint.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use crate::metrics;
use crate::server::AppState;

/// GET /metrics - Prometheus metrics endpoint
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    update_metrics_from_state(&state);

    match metrics::encode_metrics() {
        Ok(output) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode Prometheus metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(axum::http::header::CONTENT_TYPE, "text/plain")],
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

/// Refresh gauges that are sampled rather than updated inline
fn update_metrics_from_state(state: &AppState) {
    metrics::SESSIONS_ACTIVE.set(state.hub.sessions().len() as i64);
    metrics::ROOMS_ACTIVE.set(state.connection_manager.room_count() as i64);
    metrics::RATELIMIT_TRACKED_ORIGINS
        .set(state.hub.rate_limiter().stats().tracked_origins as i64);
}
