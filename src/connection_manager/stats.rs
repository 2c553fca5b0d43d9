//! Connection statistics and info structures

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-wide connection counters.
///
/// Only the two monotonic counters are stored; the active count is derived
/// so `active = total - disconnections` holds for every snapshot.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    total_connections: AtomicU64,
    disconnections: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an accepted connection, returning the new total
    pub fn record_connect(&self) -> u64 {
        self.total_connections.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Count a disconnection, returning the new disconnection total
    pub fn record_disconnect(&self) -> u64 {
        self.disconnections.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        // Disconnections never outrun connections, so read them first
        let disconnections = self.disconnections.load(Ordering::Acquire);
        let total_connections = self.total_connections.load(Ordering::Acquire);
        StatsSnapshot {
            total_connections,
            active_connections: total_connections.saturating_sub(disconnections),
            disconnections,
        }
    }
}

/// Point-in-time view of the connection counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub total_connections: u64,
    pub active_connections: u64,
    pub disconnections: u64,
}

/// Room information
#[derive(Debug, Clone, Serialize)]
pub struct RoomInfo {
    pub interest_id: String,
    pub member_count: usize,
}
