use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::interest::InterestId;
use crate::websocket::ServerMessage;

use super::stats::RoomInfo;
use super::types::ConnectionHandle;

/// Tracks live connections and the interest rooms they have joined.
///
/// A room exists only while it has members: joining creates the entry,
/// and the entry is dropped when the last member leaves.
pub struct ConnectionManager {
    /// connection_id -> ConnectionHandle
    connections: DashMap<Uuid, Arc<ConnectionHandle>>,
    /// interest_id -> Set<connection_id>
    rooms: DashMap<String, HashSet<Uuid>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            rooms: DashMap::new(),
        }
    }

    /// Register a new connection
    pub fn register(
        &self,
        origin: IpAddr,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Arc<ConnectionHandle> {
        let handle = Arc::new(ConnectionHandle::new(origin, sender));
        self.connections.insert(handle.id, handle.clone());

        tracing::debug!(connection_id = %handle.id, origin = %origin, "Connection registered");

        handle
    }

    /// Unregister a connection and drop it from every room it joined.
    ///
    /// Callers mark the handle closed first so a racing join cannot re-add it.
    pub async fn unregister(&self, connection_id: Uuid) -> Option<Arc<ConnectionHandle>> {
        let (_, handle) = self.connections.remove(&connection_id)?;

        let joined: Vec<String> = handle.rooms.write().await.drain().collect();
        for room in &joined {
            self.remove_from_index(room, connection_id);
        }

        tracing::debug!(
            connection_id = %connection_id,
            rooms = joined.len(),
            "Connection unregistered"
        );

        Some(handle)
    }

    /// Add a connection to a room.
    ///
    /// Returns `None` if the connection is gone or closed, otherwise whether
    /// the connection was newly added.
    pub async fn join_room(&self, connection_id: Uuid, room: &InterestId) -> Option<bool> {
        let handle = self.get_connection(connection_id)?;

        let mut joined = handle.rooms.write().await;
        if handle.is_closed() {
            return None;
        }
        let added = joined.insert(room.to_string());
        self.rooms
            .entry(room.to_string())
            .or_default()
            .insert(connection_id);
        drop(joined);

        tracing::debug!(connection_id = %connection_id, interest_id = %room, "Joined room");
        Some(added)
    }

    /// Remove a connection from a room. Returns whether it was a member.
    pub async fn leave_room(&self, connection_id: Uuid, room: &InterestId) -> bool {
        let was_member = match self.get_connection(connection_id) {
            Some(handle) => handle.rooms.write().await.remove(room.as_str()),
            None => false,
        };
        let indexed = self.remove_from_index(room.as_str(), connection_id);

        if was_member || indexed {
            tracing::debug!(connection_id = %connection_id, interest_id = %room, "Left room");
        }
        was_member || indexed
    }

    fn remove_from_index(&self, room: &str, connection_id: Uuid) -> bool {
        let mut removed = false;
        if let Some(mut members) = self.rooms.get_mut(room) {
            removed = members.remove(&connection_id);
            if members.is_empty() {
                drop(members);
                self.rooms.remove_if(room, |_, m| m.is_empty());
            }
        }
        removed
    }

    /// Get all connections in a room
    pub fn room_members(&self, room: &str) -> Vec<Arc<ConnectionHandle>> {
        self.rooms
            .get(room)
            .map(|conn_ids| {
                conn_ids
                    .iter()
                    .filter_map(|id| self.connections.get(id).map(|h| h.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_member(&self, room: &str, connection_id: Uuid) -> bool {
        self.rooms
            .get(room)
            .map(|m| m.contains(&connection_id))
            .unwrap_or(false)
    }

    /// Get connection by ID
    pub fn get_connection(&self, connection_id: Uuid) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(&connection_id).map(|h| h.clone())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// List rooms with their member counts
    pub fn list_rooms(&self) -> Vec<RoomInfo> {
        let mut rooms: Vec<RoomInfo> = self
            .rooms
            .iter()
            .map(|entry| RoomInfo {
                interest_id: entry.key().clone(),
                member_count: entry.value().len(),
            })
            .collect();
        rooms.sort_by(|a, b| a.interest_id.cmp(&b.interest_id));
        rooms
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
