//! In-memory interest and message store backed by DashMap

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::config::InterestSeed;
use crate::interest::InterestId;

use super::{Interest, InterestStore, MessagePage, MessageStore, Pagination, StoreError, StoredMessage};

#[derive(Default)]
pub struct MemoryStore {
    interests: DashMap<InterestId, Interest>,
    /// interest id -> messages in insertion (oldest first) order
    messages: DashMap<InterestId, Vec<StoredMessage>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated from configuration seeds
    pub fn from_seeds(seeds: &[InterestSeed]) -> Result<Self, StoreError> {
        let store = Self::new();
        for seed in seeds {
            let id = InterestId::parse(&seed.id)
                .map_err(|_| StoreError::InvalidRecord(format!("interest id '{}'", seed.id)))?;
            store.insert_interest(Interest {
                id,
                name: seed.name.clone(),
                member_ids: seed.members.clone(),
            });
        }
        Ok(store)
    }

    pub fn insert_interest(&self, interest: Interest) {
        tracing::debug!(interest_id = %interest.id, name = %interest.name, "Interest stored");
        self.interests.insert(interest.id.clone(), interest);
    }

    pub fn interest_count(&self) -> usize {
        self.interests.len()
    }

    pub fn message_count(&self, interest_id: &InterestId) -> usize {
        self.messages.get(interest_id).map(|m| m.len()).unwrap_or(0)
    }
}

#[async_trait]
impl InterestStore for MemoryStore {
    async fn find_interest_by_id(&self, id: &InterestId) -> Result<Option<Interest>, StoreError> {
        Ok(self.interests.get(id).map(|i| i.value().clone()))
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn persist_message(
        &self,
        interest_id: &InterestId,
        user_id: &str,
        text: &str,
    ) -> Result<StoredMessage, StoreError> {
        if !self.interests.contains_key(interest_id) {
            return Err(StoreError::InterestNotFound(interest_id.to_string()));
        }

        let message = StoredMessage {
            id: Uuid::new_v4(),
            interest_id: interest_id.clone(),
            user_id: user_id.to_string(),
            message: text.to_string(),
            created_at: Utc::now(),
        };

        self.messages
            .entry(interest_id.clone())
            .or_default()
            .push(message.clone());

        Ok(message)
    }

    async fn list_messages(
        &self,
        interest_id: &InterestId,
        page: usize,
        limit: usize,
    ) -> Result<MessagePage, StoreError> {
        let page = page.max(1);
        let (messages, total) = match self.messages.get(interest_id) {
            Some(stored) => {
                let total = stored.len();
                let skip = (page - 1).saturating_mul(limit);
                let messages = stored
                    .iter()
                    .rev()
                    .skip(skip)
                    .take(limit)
                    .cloned()
                    .collect();
                (messages, total)
            }
            None => (Vec::new(), 0),
        };

        Ok(MessagePage {
            messages,
            pagination: Pagination::new(page, limit, total),
        })
    }
}
