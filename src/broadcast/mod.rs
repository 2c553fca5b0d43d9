//! Room fan-out.
//!
//! Delivery is fire-and-forget: a message is queued on each member's
//! outbound channel without waiting, and members whose queue is full or
//! closed are counted as failed and skipped. History stays queryable from
//! the message store, so a missed live delivery is not retried.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::connection_manager::{ConnectionHandle, ConnectionManager};
use crate::interest::InterestId;
use crate::metrics::BroadcastMetrics;
use crate::websocket::ServerMessage;

/// Result of a fan-out attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    /// Number of connections the message was queued for
    pub delivered_to: usize,
    /// Number of connections that could not take the message
    pub failed: usize,
}

/// Publishes a payload to every connection joined to an interest room.
#[async_trait]
pub trait MessageBroadcaster: Send + Sync {
    async fn broadcast(&self, interest_id: &InterestId, payload: ServerMessage) -> DeliveryResult;
}

/// Queue `message` on every connection in `members` except `exclude`.
pub fn fan_out(
    members: &[Arc<ConnectionHandle>],
    message: &ServerMessage,
    exclude: Option<Uuid>,
) -> DeliveryResult {
    let mut result = DeliveryResult::default();

    for member in members {
        if Some(member.id) == exclude || member.is_closed() {
            continue;
        }
        if member.try_deliver(message.clone()) {
            result.delivered_to += 1;
        } else {
            result.failed += 1;
        }
    }

    BroadcastMetrics::record(result.delivered_to as u64, result.failed as u64);
    result
}

/// Broadcaster backed by the local connection registry
pub struct RoomBroadcaster {
    connection_manager: Arc<ConnectionManager>,
}

impl RoomBroadcaster {
    pub fn new(connection_manager: Arc<ConnectionManager>) -> Self {
        Self { connection_manager }
    }
}

#[async_trait]
impl MessageBroadcaster for RoomBroadcaster {
    #[tracing::instrument(name = "broadcast.room", skip(self, payload), fields(interest_id = %interest_id))]
    async fn broadcast(&self, interest_id: &InterestId, payload: ServerMessage) -> DeliveryResult {
        let members = self.connection_manager.room_members(interest_id.as_str());
        let result = fan_out(&members, &payload, None);

        tracing::debug!(
            interest_id = %interest_id,
            delivered = result.delivered_to,
            failed = result.failed,
            "Broadcast to room"
        );
        result
    }
}
