//! Single-session-per-user registry.
//!
//! A user id maps to at most one live connection. Binding a user that is
//! already mapped to another connection hands back the old connection id so
//! the caller can evict it; unbinding only succeeds for the connection that
//! currently owns the mapping, so a late disconnect from an evicted
//! connection cannot remove the session that replaced it.

use dashmap::DashMap;
use uuid::Uuid;

#[derive(Default)]
pub struct SessionRegistry {
    /// user_id -> connection_id
    sessions: DashMap<String, Uuid>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `user_id` to `connection_id`.
    ///
    /// Returns the previously mapped connection when it differs from
    /// `connection_id`; that connection must be force-closed by the caller.
    pub fn bind(&self, user_id: &str, connection_id: Uuid) -> Option<Uuid> {
        let previous = self.sessions.insert(user_id.to_string(), connection_id);
        match previous {
            Some(old) if old != connection_id => {
                tracing::info!(
                    user_id = %user_id,
                    old_connection_id = %old,
                    connection_id = %connection_id,
                    "Session superseded by new connection"
                );
                Some(old)
            }
            _ => None,
        }
    }

    /// Remove the mapping for `user_id` if it still points at `connection_id`.
    pub fn unbind(&self, user_id: &str, connection_id: Uuid) -> bool {
        let removed = self
            .sessions
            .remove_if(user_id, |_, current| *current == connection_id)
            .is_some();

        if !removed {
            tracing::debug!(
                user_id = %user_id,
                connection_id = %connection_id,
                "Session already owned by a newer connection, leaving it in place"
            );
        }
        removed
    }

    /// Connection currently bound to `user_id`
    pub fn lookup(&self, user_id: &str) -> Option<Uuid> {
        self.sessions.get(user_id).map(|c| *c)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
