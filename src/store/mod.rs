//! Collaborator interfaces for interest lookup and message persistence.
//!
//! The presence core only needs to know whether an interest exists and to
//! persist chat messages before they are broadcast. Both are expressed as
//! async traits so the backing store can be swapped without touching the hub.
//! `MemoryStore` is the in-process implementation used by the binary and tests.

mod memory;
mod types;

use async_trait::async_trait;
use thiserror::Error;

use crate::interest::InterestId;

pub use memory::MemoryStore;
pub use types::{Interest, MessagePage, Pagination, StoredMessage};

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Interest not found: {0}")]
    InterestNotFound(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// Existence checks for interests (join validation, message send)
#[async_trait]
pub trait InterestStore: Send + Sync {
    async fn find_interest_by_id(&self, id: &InterestId) -> Result<Option<Interest>, StoreError>;
}

/// Persistent chat history for interest rooms
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn persist_message(
        &self,
        interest_id: &InterestId,
        user_id: &str,
        text: &str,
    ) -> Result<StoredMessage, StoreError>;

    /// Page through messages for an interest, newest first. `page` is 1-based.
    async fn list_messages(
        &self,
        interest_id: &InterestId,
        page: usize,
        limit: usize,
    ) -> Result<MessagePage, StoreError>;
}
