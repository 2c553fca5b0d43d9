//! Live connection registry, room membership index and connection counters.

mod registry;
mod stats;
mod types;

pub use registry::ConnectionManager;
pub use stats::{ConnectionStats, RoomInfo, StatsSnapshot};
pub use types::{ConnectionHandle, ConnectionState, UNKNOWN_USER};
