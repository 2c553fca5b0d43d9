use std::sync::Arc;
use std::time::Instant;

use crate::auth::JwtValidator;
use crate::broadcast::{MessageBroadcaster, RoomBroadcaster};
use crate::config::Settings;
use crate::connection_manager::ConnectionManager;
use crate::error::Result;
use crate::presence::PresenceHub;
use crate::store::{InterestStore, MemoryStore, MessageStore};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub jwt_validator: Arc<JwtValidator>,
    pub connection_manager: Arc<ConnectionManager>,
    pub hub: Arc<PresenceHub>,
    pub broadcaster: Arc<dyn MessageBroadcaster>,
    pub interests: Arc<dyn InterestStore>,
    pub messages: Arc<dyn MessageStore>,
    pub start_time: Instant,
}

impl AppState {
    /// Build the state with an in-memory store seeded from `settings.interests`.
    pub fn new(settings: Settings) -> Result<Self> {
        let store = Arc::new(MemoryStore::from_seeds(&settings.interests)?);
        tracing::info!(interests = store.interest_count(), "Interest store loaded");
        Ok(Self::with_store(settings, store.clone(), store))
    }

    pub fn with_store(
        settings: Settings,
        interests: Arc<dyn InterestStore>,
        messages: Arc<dyn MessageStore>,
    ) -> Self {
        let jwt_validator = Arc::new(JwtValidator::new(&settings.jwt));
        let connection_manager = Arc::new(ConnectionManager::new());
        let hub = Arc::new(PresenceHub::new(
            &settings.presence,
            connection_manager.clone(),
            interests.clone(),
        ));
        let broadcaster: Arc<dyn MessageBroadcaster> =
            Arc::new(RoomBroadcaster::new(connection_manager.clone()));

        Self {
            settings: Arc::new(settings),
            jwt_validator,
            connection_manager,
            hub,
            broadcaster,
            interests,
            messages,
            start_time: Instant::now(),
        }
    }
}
