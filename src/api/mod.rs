//! API layer - HTTP endpoint handlers organized by domain.

mod health;
mod messages;
mod metrics;
mod routes;

pub use health::{health, stats, HealthResponse, StatsResponse};
pub use messages::{list_messages, send_message};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
