use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::broadcast::{fan_out, DeliveryResult};
use crate::config::PresenceConfig;
use crate::connection_manager::{ConnectionHandle, ConnectionManager, ConnectionStats, StatsSnapshot};
use crate::error::PresenceError;
use crate::interest::InterestId;
use crate::metrics::{ConnectionMetrics, RateLimitMetrics, RoomMetrics, SessionMetrics, WsMessageMetrics};
use crate::ratelimit::{ConnectionRateLimiter, RateLimitConfig};
use crate::session::SessionRegistry;
use crate::store::InterestStore;
use crate::websocket::{ClientMessage, ServerMessage, TypingPayload};

const STATS_CHANNEL_CAPACITY: usize = 16;

/// What the socket loop should do after an event was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Continue,
    /// Client asked to disconnect, with its reason
    Disconnect(String),
}

/// Owns all presence state and applies connection lifecycle events to it.
///
/// Every operation validates its input before touching shared state, and
/// no map lock is held across the interest lookup.
pub struct PresenceHub {
    connection_manager: Arc<ConnectionManager>,
    sessions: SessionRegistry,
    rate_limiter: ConnectionRateLimiter,
    stats: ConnectionStats,
    interests: Arc<dyn InterestStore>,
    stats_log_interval: u64,
    snapshots: broadcast::Sender<StatsSnapshot>,
}

impl PresenceHub {
    pub fn new(
        config: &PresenceConfig,
        connection_manager: Arc<ConnectionManager>,
        interests: Arc<dyn InterestStore>,
    ) -> Self {
        let (snapshots, _) = broadcast::channel(STATS_CHANNEL_CAPACITY);
        Self {
            connection_manager,
            sessions: SessionRegistry::new(),
            rate_limiter: ConnectionRateLimiter::new(RateLimitConfig::from(config)),
            stats: ConnectionStats::new(),
            interests,
            stats_log_interval: config.stats_log_interval,
            snapshots,
        }
    }

    pub fn connection_manager(&self) -> &Arc<ConnectionManager> {
        &self.connection_manager
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn rate_limiter(&self) -> &ConnectionRateLimiter {
        &self.rate_limiter
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Receive the periodic aggregate stats snapshots
    pub fn subscribe_stats(&self) -> broadcast::Receiver<StatsSnapshot> {
        self.snapshots.subscribe()
    }

    /// Admit and register a new connection from `origin`.
    pub fn connect(
        &self,
        origin: IpAddr,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<Arc<ConnectionHandle>, PresenceError> {
        self.connect_at(origin, sender, Utc::now().timestamp_millis())
    }

    /// `connect` with an explicit attempt time, in Unix milliseconds
    pub fn connect_at(
        &self,
        origin: IpAddr,
        sender: mpsc::Sender<ServerMessage>,
        now_ms: i64,
    ) -> Result<Arc<ConnectionHandle>, PresenceError> {
        if !self.rate_limiter.admit(origin, now_ms) {
            RateLimitMetrics::record_denied();
            tracing::warn!(origin = %origin, "Rate limit exceeded");
            return Err(PresenceError::RateLimited {
                origin: origin.to_string(),
            });
        }
        RateLimitMetrics::record_allowed();

        let handle = self.connection_manager.register(origin, sender);
        self.stats.record_connect();
        ConnectionMetrics::record_opened();

        tracing::info!(
            connection_id = %handle.id,
            origin = %origin,
            active_connections = self.stats.snapshot().active_connections,
            "User connected"
        );

        Ok(handle)
    }

    /// Dispatch one inbound client event.
    ///
    /// Validation failures are reported to the originating connection only.
    pub async fn handle_event(
        &self,
        handle: &Arc<ConnectionHandle>,
        event: ClientMessage,
    ) -> EventOutcome {
        WsMessageMetrics::record(event.kind());

        let result = match event {
            ClientMessage::Authenticate(user_id) => self.authenticate(handle, user_id).await,
            ClientMessage::JoinInterest(id) => self.join_interest(handle, &id).await.map(|_| ()),
            ClientMessage::LeaveInterest(id) => self.leave_interest(handle, &id).await.map(|_| ()),
            ClientMessage::Typing(payload) => self.typing(handle, payload).await.map(|_| ()),
            ClientMessage::Disconnect(reason) => return EventOutcome::Disconnect(reason),
        };

        match result {
            Ok(()) => {}
            Err(PresenceError::ConnectionClosed) => {
                tracing::debug!(connection_id = %handle.id, "Event ignored on closed connection");
            }
            Err(e) => {
                tracing::debug!(connection_id = %handle.id, code = e.code(), error = %e, "Event rejected");
                WsMessageMetrics::record_error(e.code());
                let _ = handle.send(ServerMessage::from(&e)).await;
            }
        }

        EventOutcome::Continue
    }

    /// Bind `user_id` to this connection, evicting any older session for it.
    #[tracing::instrument(
        name = "presence.authenticate",
        skip(self, handle, user_id),
        fields(connection_id = %handle.id)
    )]
    pub async fn authenticate(
        &self,
        handle: &Arc<ConnectionHandle>,
        user_id: String,
    ) -> Result<(), PresenceError> {
        if handle.is_closed() {
            return Err(PresenceError::ConnectionClosed);
        }
        if user_id.trim().is_empty() {
            return Err(PresenceError::InvalidFormat("Invalid user ID".to_string()));
        }

        // The label is set before the session is bound so a concurrent
        // disconnect always sees the user it has to unbind.
        if let Some(previous) = handle.set_user_id(user_id.clone()).await {
            if previous != user_id {
                self.sessions.unbind(&previous, handle.id);
            }
        }

        if let Some(evicted) = self.sessions.bind(&user_id, handle.id) {
            tracing::info!(
                user_id = %user_id,
                old_connection_id = %evicted,
                "Duplicate connection detected"
            );
            self.evict(evicted);
        }

        if handle.is_closed() {
            self.sessions.unbind(&user_id, handle.id);
            return Err(PresenceError::ConnectionClosed);
        }

        handle.mark_authenticated();
        SessionMetrics::record_authenticated();
        tracing::info!(user_id = %user_id, connection_id = %handle.id, "User authenticated");

        Ok(())
    }

    fn evict(&self, connection_id: Uuid) {
        match self.connection_manager.get_connection(connection_id) {
            Some(old) => {
                SessionMetrics::record_superseded();
                old.force_close(ServerMessage::ForceDisconnect(
                    PresenceError::Superseded.to_string(),
                ));
            }
            None => {
                tracing::debug!(
                    connection_id = %connection_id,
                    "Superseded connection already gone"
                );
            }
        }
    }

    /// Join the room for an interest after checking that the interest exists.
    ///
    /// Every successful join is announced to the other members, including a
    /// repeat join by a connection that is already in the room.
    #[tracing::instrument(
        name = "presence.join",
        skip(self, handle),
        fields(connection_id = %handle.id)
    )]
    pub async fn join_interest(
        &self,
        handle: &Arc<ConnectionHandle>,
        raw_id: &str,
    ) -> Result<InterestId, PresenceError> {
        if handle.is_closed() {
            return Err(PresenceError::ConnectionClosed);
        }

        let interest_id = InterestId::parse(raw_id).inspect_err(|_| {
            RoomMetrics::record_rejected();
            tracing::info!(connection_id = %handle.id, interest_id = %raw_id, "Invalid interest ID");
        })?;

        let interest = self
            .interests
            .find_interest_by_id(&interest_id)
            .await
            .map_err(|e| {
                tracing::error!(interest_id = %interest_id, error = %e, "Interest lookup failed");
                PresenceError::Store("Failed to join interest".to_string())
            })?;

        if interest.is_none() {
            RoomMetrics::record_rejected();
            tracing::info!(interest_id = %interest_id, "Interest not found");
            return Err(PresenceError::NotFound("Interest not found".to_string()));
        }

        let newly_joined = self
            .connection_manager
            .join_room(handle.id, &interest_id)
            .await
            .ok_or(PresenceError::ConnectionClosed)?;

        RoomMetrics::record_join();
        tracing::info!(
            connection_id = %handle.id,
            interest_id = %interest_id,
            newly_joined,
            "User joined interest"
        );

        let notice = ServerMessage::UserJoined {
            socket_id: handle.id.to_string(),
            user_id: handle.user_label().await,
        };
        let members = self.connection_manager.room_members(interest_id.as_str());
        fan_out(&members, &notice, Some(handle.id));

        Ok(interest_id)
    }

    /// Leave an interest room. Leaving a room that was never joined succeeds
    /// without notifying anyone. Returns whether the connection was a member.
    #[tracing::instrument(
        name = "presence.leave",
        skip(self, handle),
        fields(connection_id = %handle.id)
    )]
    pub async fn leave_interest(
        &self,
        handle: &Arc<ConnectionHandle>,
        raw_id: &str,
    ) -> Result<bool, PresenceError> {
        if handle.is_closed() {
            return Err(PresenceError::ConnectionClosed);
        }

        let interest_id = InterestId::parse(raw_id).inspect_err(|_| {
            RoomMetrics::record_rejected();
        })?;

        let was_member = self
            .connection_manager
            .leave_room(handle.id, &interest_id)
            .await;

        if was_member {
            RoomMetrics::record_leave();
            tracing::info!(
                connection_id = %handle.id,
                interest_id = %interest_id,
                "User left interest"
            );

            let notice = ServerMessage::UserLeft {
                socket_id: handle.id.to_string(),
                user_id: handle.user_label().await,
            };
            let members = self.connection_manager.room_members(interest_id.as_str());
            fan_out(&members, &notice, Some(handle.id));
        }

        Ok(was_member)
    }

    /// Relay a typing indicator to the other members of the room.
    pub async fn typing(
        &self,
        handle: &Arc<ConnectionHandle>,
        payload: TypingPayload,
    ) -> Result<DeliveryResult, PresenceError> {
        if handle.is_closed() {
            return Err(PresenceError::ConnectionClosed);
        }

        let TypingPayload {
            interest_id,
            user_id,
            is_typing,
        } = payload;

        let (Some(raw_id), Some(user_id)) = (
            interest_id.filter(|id| !id.is_empty()),
            user_id.filter(|id| !id.is_empty()),
        ) else {
            RoomMetrics::record_rejected();
            return Err(PresenceError::InvalidFormat("Invalid typing data".to_string()));
        };

        let interest_id = InterestId::parse(&raw_id).map_err(|_| {
            RoomMetrics::record_rejected();
            PresenceError::InvalidFormat("Invalid interest ID".to_string())
        })?;

        let notice = ServerMessage::UserTyping {
            user_id,
            is_typing,
            socket_id: handle.id.to_string(),
        };
        let members = self.connection_manager.room_members(interest_id.as_str());
        let result = fan_out(&members, &notice, Some(handle.id));

        RoomMetrics::record_typing();
        tracing::debug!(
            connection_id = %handle.id,
            interest_id = %interest_id,
            delivered = result.delivered_to,
            "Typing indicator relayed"
        );

        Ok(result)
    }

    /// Tear down a connection. Safe to call more than once; only the first
    /// call updates the counters.
    ///
    /// Returns the aggregate snapshot when this disconnection hit the
    /// logging interval.
    #[tracing::instrument(
        name = "presence.disconnect",
        skip(self, handle),
        fields(connection_id = %handle.id)
    )]
    pub async fn disconnect(
        &self,
        handle: &Arc<ConnectionHandle>,
        reason: &str,
    ) -> Option<StatsSnapshot> {
        if !handle.mark_closed() {
            return None;
        }

        self.connection_manager.unregister(handle.id).await;

        if let Some(user_id) = handle.user_id().await {
            self.sessions.unbind(&user_id, handle.id);
        }

        let disconnections = self.stats.record_disconnect();
        let duration = (Utc::now() - handle.connected_at).num_milliseconds().max(0) as f64 / 1000.0;
        ConnectionMetrics::record_closed(duration);

        tracing::info!(
            connection_id = %handle.id,
            reason = %reason,
            duration_secs = duration,
            "User disconnected"
        );

        if self.stats_log_interval > 0 && disconnections % self.stats_log_interval == 0 {
            let snapshot = self.stats.snapshot();
            tracing::info!(
                total_connections = snapshot.total_connections,
                active_connections = snapshot.active_connections,
                disconnections = snapshot.disconnections,
                "Connection stats"
            );
            let _ = self.snapshots.send(snapshot);
            return Some(snapshot);
        }

        None
    }

    /// Record a transport-level failure. The socket loop ends afterwards and
    /// the disconnect that follows does the bookkeeping.
    pub fn transport_error(&self, handle: &ConnectionHandle, error: &str) {
        let err = PresenceError::Transport(error.to_string());
        tracing::warn!(connection_id = %handle.id, code = err.code(), error = %err, "Socket error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Interest, MemoryStore};
    use std::net::Ipv4Addr;

    const ROOM: &str = "507f1f77bcf86cd799439011";

    fn hub() -> PresenceHub {
        let store = MemoryStore::new();
        store.insert_interest(Interest {
            id: InterestId::parse(ROOM).unwrap(),
            name: "Climbing".to_string(),
            member_ids: vec![],
        });
        let config = PresenceConfig {
            rate_limit_enabled: false,
            ..Default::default()
        };
        PresenceHub::new(&config, Arc::new(ConnectionManager::new()), Arc::new(store))
    }

    fn connect(hub: &PresenceHub) -> (Arc<ConnectionHandle>, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(16);
        let handle = hub
            .connect(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), tx)
            .unwrap();
        (handle, rx)
    }

    #[tokio::test]
    async fn test_invalid_join_reports_error_to_caller_only() {
        let hub = hub();
        let (a, mut rx_a) = connect(&hub);
        let (b, mut rx_b) = connect(&hub);
        hub.join_interest(&b, ROOM).await.unwrap();

        let outcome = hub
            .handle_event(&a, ClientMessage::JoinInterest("not-a-valid-id".to_string()))
            .await;
        assert_eq!(outcome, EventOutcome::Continue);

        match rx_a.try_recv() {
            Ok(ServerMessage::Error(message)) => {
                assert_eq!(message, "Invalid interest ID format");
            }
            other => panic!("expected error event, got {:?}", other),
        }
        assert!(rx_b.try_recv().is_err());
        assert_eq!(hub.connection_manager().room_count(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_event_ends_loop() {
        let hub = hub();
        let (a, _rx) = connect(&hub);
        let outcome = hub
            .handle_event(&a, ClientMessage::Disconnect("client namespace disconnect".into()))
            .await;
        assert_eq!(
            outcome,
            EventOutcome::Disconnect("client namespace disconnect".to_string())
        );
    }

    #[tokio::test]
    async fn test_events_after_close_are_dropped_silently() {
        let hub = hub();
        let (a, mut rx_a) = connect(&hub);
        hub.disconnect(&a, "transport close").await;

        hub.handle_event(&a, ClientMessage::JoinInterest(ROOM.to_string()))
            .await;
        assert!(rx_a.try_recv().is_err());
        assert_eq!(hub.connection_manager().room_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let hub = hub();
        let (a, _rx) = connect(&hub);

        hub.disconnect(&a, "transport close").await;
        hub.disconnect(&a, "transport close").await;

        let stats = hub.stats();
        assert_eq!(stats.total_connections, 1);
        assert_eq!(stats.disconnections, 1);
        assert_eq!(stats.active_connections, 0);
    }

    #[tokio::test]
    async fn test_empty_user_id_rejected() {
        let hub = hub();
        let (a, _rx) = connect(&hub);
        let err = hub.authenticate(&a, "  ".to_string()).await.unwrap_err();
        assert!(matches!(err, PresenceError::InvalidFormat(_)));
        assert!(hub.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_reauthenticate_as_other_user_releases_first() {
        let hub = hub();
        let (a, _rx) = connect(&hub);

        hub.authenticate(&a, "u1".to_string()).await.unwrap();
        hub.authenticate(&a, "u2".to_string()).await.unwrap();

        assert_eq!(hub.sessions().lookup("u1"), None);
        assert_eq!(hub.sessions().lookup("u2"), Some(a.id));
    }

    #[tokio::test]
    async fn test_join_notifies_with_bound_user() {
        let hub = hub();
        let (a, _rx_a) = connect(&hub);
        let (b, mut rx_b) = connect(&hub);
        hub.join_interest(&b, ROOM).await.unwrap();

        hub.authenticate(&a, "alice".to_string()).await.unwrap();
        hub.join_interest(&a, ROOM).await.unwrap();

        match rx_b.try_recv() {
            Ok(ServerMessage::UserJoined { socket_id, user_id }) => {
                assert_eq!(socket_id, a.id.to_string());
                assert_eq!(user_id, "alice");
            }
            other => panic!("expected userJoined, got {:?}", other),
        }

        // A repeat join is announced again but membership stays single
        hub.join_interest(&a, ROOM).await.unwrap();
        assert!(matches!(
            rx_b.try_recv(),
            Ok(ServerMessage::UserJoined { ref user_id, .. }) if user_id == "alice"
        ));
        assert!(rx_b.try_recv().is_err());
        assert_eq!(hub.connection_manager().room_members(ROOM).len(), 2);
    }

    #[tokio::test]
    async fn test_typing_requires_interest_id() {
        let hub = hub();
        let (a, _rx_a) = connect(&hub);
        let payload = TypingPayload {
            interest_id: None,
            user_id: Some("u1".to_string()),
            is_typing: true,
        };
        let err = hub.typing(&a, payload).await.unwrap_err();
        assert_eq!(err, PresenceError::InvalidFormat("Invalid typing data".to_string()));
    }
}
