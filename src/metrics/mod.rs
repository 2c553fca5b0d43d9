//! Prometheus metrics for the chat presence service.
//!
//! - Connection metrics (opened, closed, active, duration)
//! - Session metrics (authentications, superseded sessions)
//! - Room metrics (joins, leaves, typing, active rooms)
//! - Broadcast delivery metrics
//! - Rate limiting metrics

mod helpers;

pub use helpers::{
    encode_metrics, BroadcastMetrics, ConnectionMetrics, RateLimitMetrics, RoomMetrics,
    SessionMetrics, WsMessageMetrics,
};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "interest_chat";

lazy_static! {
    // ============================================================================
    // Connection Metrics
    // ============================================================================

    /// Currently open WebSocket connections
    pub static ref CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_connections_active", METRIC_PREFIX),
        "Number of currently open WebSocket connections"
    ).unwrap();

    /// WebSocket connections opened
    pub static ref WS_CONNECTIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_opened_total", METRIC_PREFIX),
        "Total WebSocket connections opened"
    ).unwrap();

    /// WebSocket connections closed
    pub static ref WS_CONNECTIONS_CLOSED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_closed_total", METRIC_PREFIX),
        "Total WebSocket connections closed"
    ).unwrap();

    /// WebSocket connection duration
    pub static ref WS_CONNECTION_DURATION: Histogram = register_histogram!(
        format!("{}_ws_connection_duration_seconds", METRIC_PREFIX),
        "WebSocket connection duration in seconds",
        vec![1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0, 1800.0, 3600.0]
    ).unwrap();

    /// WebSocket messages received from clients
    pub static ref WS_MESSAGES_RECEIVED: IntCounterVec = register_int_counter_vec!(
        format!("{}_ws_messages_received_total", METRIC_PREFIX),
        "Total WebSocket messages received from clients",
        &["type"]
    ).unwrap();

    /// Error events sent back to clients, by error code
    pub static ref WS_ERRORS_SENT: IntCounterVec = register_int_counter_vec!(
        format!("{}_ws_errors_sent_total", METRIC_PREFIX),
        "Total error events sent to clients",
        &["code"]
    ).unwrap();

    // ============================================================================
    // Session Metrics
    // ============================================================================

    /// Successful authenticate events
    pub static ref SESSIONS_AUTHENTICATED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_sessions_authenticated_total", METRIC_PREFIX),
        "Total connections bound to a user id"
    ).unwrap();

    /// Older sessions evicted by a newer connection for the same user
    pub static ref SESSIONS_SUPERSEDED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_sessions_superseded_total", METRIC_PREFIX),
        "Total sessions force-closed because the user connected again"
    ).unwrap();

    /// Users with a live session
    pub static ref SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_sessions_active", METRIC_PREFIX),
        "Number of users with a live session"
    ).unwrap();

    // ============================================================================
    // Room Metrics
    // ============================================================================

    /// Room events by kind (join, leave, typing, rejected)
    pub static ref ROOM_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_room_events_total", METRIC_PREFIX),
        "Total room events processed",
        &["event"]
    ).unwrap();

    /// Rooms with at least one member
    pub static ref ROOMS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_rooms_active", METRIC_PREFIX),
        "Number of interest rooms with at least one member"
    ).unwrap();

    // ============================================================================
    // Broadcast Metrics
    // ============================================================================

    /// Fan-out deliveries queued
    pub static ref BROADCAST_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_broadcast_delivered_total", METRIC_PREFIX),
        "Total messages queued to room members"
    ).unwrap();

    /// Fan-out deliveries dropped (full or closed queue)
    pub static ref BROADCAST_FAILED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_broadcast_failed_total", METRIC_PREFIX),
        "Total messages that could not be queued to a room member"
    ).unwrap();

    // ============================================================================
    // Rate Limiting Metrics
    // ============================================================================

    /// Connection attempts admitted
    pub static ref RATELIMIT_ALLOWED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_ratelimit_allowed_total", METRIC_PREFIX),
        "Total connection attempts admitted by the rate limiter"
    ).unwrap();

    /// Connection attempts rejected
    pub static ref RATELIMIT_DENIED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_ratelimit_denied_total", METRIC_PREFIX),
        "Total connection attempts rejected by the rate limiter"
    ).unwrap();

    /// Origins with a live rate-limit window
    pub static ref RATELIMIT_TRACKED_ORIGINS: IntGauge = register_int_gauge!(
        format!("{}_ratelimit_tracked_origins", METRIC_PREFIX),
        "Number of origins with recorded connection attempts"
    ).unwrap();
}
