use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;

use super::health::{health, stats};
use super::messages::{list_messages, send_message};
use super::metrics::prometheus_metrics;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Interest messages
        .nest(
            "/api",
            Router::new()
                .route("/messages", post(send_message))
                .route("/messages/{interest_id}", get(list_messages)),
        )
}
