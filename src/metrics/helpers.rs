//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    BROADCAST_DELIVERED_TOTAL, BROADCAST_FAILED_TOTAL, CONNECTIONS_ACTIVE, RATELIMIT_ALLOWED_TOTAL,
    RATELIMIT_DENIED_TOTAL, ROOM_EVENTS_TOTAL, SESSIONS_AUTHENTICATED_TOTAL,
    SESSIONS_SUPERSEDED_TOTAL, WS_CONNECTIONS_CLOSED, WS_CONNECTIONS_OPENED,
    WS_CONNECTION_DURATION, WS_ERRORS_SENT, WS_MESSAGES_RECEIVED,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

pub struct ConnectionMetrics;

impl ConnectionMetrics {
    pub fn record_opened() {
        WS_CONNECTIONS_OPENED.inc();
        CONNECTIONS_ACTIVE.inc();
    }

    pub fn record_closed(duration_secs: f64) {
        WS_CONNECTIONS_CLOSED.inc();
        CONNECTIONS_ACTIVE.dec();
        WS_CONNECTION_DURATION.observe(duration_secs);
    }
}

pub struct SessionMetrics;

impl SessionMetrics {
    pub fn record_authenticated() {
        SESSIONS_AUTHENTICATED_TOTAL.inc();
    }

    pub fn record_superseded() {
        SESSIONS_SUPERSEDED_TOTAL.inc();
    }
}

pub struct RoomMetrics;

impl RoomMetrics {
    pub fn record_join() {
        ROOM_EVENTS_TOTAL.with_label_values(&["join"]).inc();
    }

    pub fn record_leave() {
        ROOM_EVENTS_TOTAL.with_label_values(&["leave"]).inc();
    }

    pub fn record_typing() {
        ROOM_EVENTS_TOTAL.with_label_values(&["typing"]).inc();
    }

    /// An event dropped by validation before reaching any room
    pub fn record_rejected() {
        ROOM_EVENTS_TOTAL.with_label_values(&["rejected"]).inc();
    }
}

pub struct BroadcastMetrics;

impl BroadcastMetrics {
    pub fn record(delivered: u64, failed: u64) {
        BROADCAST_DELIVERED_TOTAL.inc_by(delivered);
        BROADCAST_FAILED_TOTAL.inc_by(failed);
    }
}

pub struct RateLimitMetrics;

impl RateLimitMetrics {
    pub fn record_allowed() {
        RATELIMIT_ALLOWED_TOTAL.inc();
    }

    pub fn record_denied() {
        RATELIMIT_DENIED_TOTAL.inc();
    }
}

pub struct WsMessageMetrics;

impl WsMessageMetrics {
    /// Record an inbound client event by name
    pub fn record(kind: &str) {
        WS_MESSAGES_RECEIVED.with_label_values(&[kind]).inc();
    }

    pub fn record_invalid() {
        WS_MESSAGES_RECEIVED.with_label_values(&["invalid"]).inc();
    }

    /// Record an error event sent back to a client
    pub fn record_error(code: &str) {
        WS_ERRORS_SENT.with_label_values(&[code]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics() {
        RoomMetrics::record_join();
        RateLimitMetrics::record_denied();

        let output = encode_metrics().unwrap();
        assert!(output.contains("interest_chat_room_events_total"));
        assert!(output.contains("interest_chat_ratelimit_denied_total"));
    }

    #[test]
    fn test_helpers_do_not_panic() {
        ConnectionMetrics::record_opened();
        ConnectionMetrics::record_closed(1.5);
        SessionMetrics::record_authenticated();
        SessionMetrics::record_superseded();
        RoomMetrics::record_leave();
        RoomMetrics::record_typing();
        RoomMetrics::record_rejected();
        BroadcastMetrics::record(3, 1);
        RateLimitMetrics::record_allowed();
        WsMessageMetrics::record("typing");
        WsMessageMetrics::record_invalid();
        WsMessageMetrics::record_error("INVALID_FORMAT");
    }
}
