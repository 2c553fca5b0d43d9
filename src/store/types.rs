use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::interest::InterestId;

/// An interest group; chat rooms are scoped 1:1 to interests
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interest {
    pub id: InterestId,
    pub name: String,
    /// Users allowed to post into the interest's room
    pub member_ids: Vec<String>,
}

impl Interest {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.member_ids.iter().any(|m| m == user_id)
    }
}

/// A persisted chat message
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: Uuid,
    pub interest_id: InterestId,
    pub user_id: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_messages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(current_page: usize, limit: usize, total_messages: usize) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total_messages.div_ceil(limit)
        };
        Self {
            current_page,
            total_pages,
            total_messages,
            has_next: current_page < total_pages,
            has_prev: current_page > 1,
        }
    }
}

/// One page of messages, newest first
#[derive(Debug, Clone, Serialize)]
pub struct MessagePage {
    pub messages: Vec<StoredMessage>,
    pub pagination: Pagination,
}
