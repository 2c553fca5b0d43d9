//! Connection handle and related types

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Notify, RwLock};
use uuid::Uuid;

use crate::websocket::ServerMessage;

/// Label used in notifications for connections that never authenticated
pub const UNKNOWN_USER: &str = "unknown";

/// Lifecycle of a single connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Admitted by the rate limiter, not yet authenticated
    Connected = 0,
    /// A user id has been bound to the connection
    Authenticated = 1,
    /// Terminal
    Closed = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connected,
            1 => ConnectionState::Authenticated,
            _ => ConnectionState::Closed,
        }
    }
}

/// Handle for a single WebSocket connection
#[derive(Debug)]
pub struct ConnectionHandle {
    pub id: Uuid,
    pub origin: IpAddr,
    pub sender: mpsc::Sender<ServerMessage>,
    pub connected_at: DateTime<Utc>,
    user_id: RwLock<Option<String>>,
    state: AtomicU8,
    /// Interest rooms this connection has joined
    pub rooms: RwLock<HashSet<String>>,
    close_signal: Notify,
    /// Final frame written by the socket writer after a forced close
    close_notice: OnceLock<ServerMessage>,
}

impl ConnectionHandle {
    pub fn new(origin: IpAddr, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin,
            sender,
            connected_at: Utc::now(),
            user_id: RwLock::new(None),
            state: AtomicU8::new(ConnectionState::Connected as u8),
            rooms: RwLock::new(HashSet::new()),
            close_notice: OnceLock::new(),
            close_signal: Notify::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    /// Move Connected -> Authenticated. A closed connection stays closed.
    pub fn mark_authenticated(&self) -> bool {
        self.state
            .compare_exchange(
                ConnectionState::Connected as u8,
                ConnectionState::Authenticated as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
            || self.state() == ConnectionState::Authenticated
    }

    /// Move to Closed. Returns false if the connection was already closed.
    pub fn mark_closed(&self) -> bool {
        self.state.swap(ConnectionState::Closed as u8, Ordering::AcqRel)
            != ConnectionState::Closed as u8
    }

    pub async fn user_id(&self) -> Option<String> {
        self.user_id.read().await.clone()
    }

    /// Bound user id, or `"unknown"` for notifications
    pub async fn user_label(&self) -> String {
        self.user_id
            .read()
            .await
            .clone()
            .unwrap_or_else(|| UNKNOWN_USER.to_string())
    }

    /// Bind a user id, returning the one it replaced
    pub async fn set_user_id(&self, user_id: String) -> Option<String> {
        self.user_id.write().await.replace(user_id)
    }

    /// Queue a message for this connection, waiting for buffer space
    pub async fn send(
        &self,
        message: ServerMessage,
    ) -> Result<(), mpsc::error::SendError<ServerMessage>> {
        self.sender.send(message).await
    }

    /// Queue a message without waiting. Used for fan-out, where one slow
    /// member must not hold up delivery to the rest of the room.
    pub fn try_deliver(&self, message: ServerMessage) -> bool {
        match self.sender.try_send(message) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(
                    connection_id = %self.id,
                    error = %e,
                    "Dropped outbound message"
                );
                false
            }
        }
    }

    /// Tell the client why it is being dropped, then signal the writer to close.
    ///
    /// The notice bypasses the outbound queue so a full queue cannot drop it.
    /// Only the first notice is kept.
    pub fn force_close(&self, message: ServerMessage) {
        let _ = self.close_notice.set(message);
        self.close_signal.notify_one();
    }

    /// Notice recorded by `force_close`, if any
    pub fn close_notice(&self) -> Option<&ServerMessage> {
        self.close_notice.get()
    }

    /// Resolves once `force_close` has been called
    pub async fn closed(&self) {
        self.close_signal.notified().await;
    }
}
