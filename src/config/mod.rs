mod settings;

pub use settings::{
    InterestSeed, JwtConfig, PresenceConfig, ServerConfig, Settings, WebSocketConfig,
};
