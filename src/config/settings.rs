use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    /// Interests available to the in-memory store at startup
    #[serde(default)]
    pub interests: Vec<InterestSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins; empty or `*` means any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresenceConfig {
    /// Whether connection rate limiting per origin is enforced
    #[serde(default = "default_rate_limit_enabled")]
    pub rate_limit_enabled: bool,
    /// Length of the trailing connection-attempt window in seconds
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_seconds: u64,
    /// Attempts allowed per origin inside one window
    #[serde(default = "default_max_connections_per_window")]
    pub max_connections_per_window: usize,
    /// Emit an aggregate stats snapshot every N disconnections
    #[serde(default = "default_stats_log_interval")]
    pub stats_log_interval: u64,
    /// How often idle rate-limit windows are dropped, in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Outbound queue depth per connection
    #[serde(default = "default_channel_buffer_size")]
    pub channel_buffer_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterestSeed {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_rate_limit_window() -> u64 {
    60
}

fn default_max_connections_per_window() -> usize {
    5
}

fn default_stats_log_interval() -> u64 {
    10
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_channel_buffer_size() -> usize {
    64
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("presence.rate_limit_enabled", default_rate_limit_enabled())?
            .set_default("presence.rate_limit_window_seconds", default_rate_limit_window())?
            .set_default(
                "presence.max_connections_per_window",
                default_max_connections_per_window() as u64,
            )?
            .set_default("presence.stats_log_interval", default_stats_log_interval())?
            .set_default("presence.cleanup_interval_seconds", default_cleanup_interval())?
            .set_default(
                "websocket.channel_buffer_size",
                default_channel_buffer_size() as u64,
            )?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // APP_SERVER__PORT, APP_JWT__SECRET, APP_PRESENCE__STATS_LOG_INTERVAL, ...
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins"),
            )
            // Variable names the mobile backend has always been deployed with
            .set_override_option("server.port", env::var("PORT_BACKEND").ok())?
            .set_override_option("jwt.secret", env::var("JWT_SECRET").ok())?;

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would fail later at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.websocket.channel_buffer_size == 0 {
            return Err(ConfigError::Message(
                "websocket.channel_buffer_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// True when the transport should accept any CORS origin
    pub fn allows_any_origin(&self) -> bool {
        self.server.cors_origins.is_empty() || self.server.cors_origins.iter().any(|o| o == "*")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            rate_limit_enabled: default_rate_limit_enabled(),
            rate_limit_window_seconds: default_rate_limit_window(),
            max_connections_per_window: default_max_connections_per_window(),
            stats_log_interval: default_stats_log_interval(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: default_channel_buffer_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 4000);

        let presence = PresenceConfig::default();
        assert!(presence.rate_limit_enabled);
        assert_eq!(presence.rate_limit_window_seconds, 60);
        assert_eq!(presence.max_connections_per_window, 5);
        assert_eq!(presence.stats_log_interval, 10);
    }

    fn test_settings() -> Settings {
        Settings {
            server: ServerConfig::default(),
            jwt: JwtConfig {
                secret: "secret".to_string(),
                issuer: None,
                audience: None,
            },
            presence: PresenceConfig::default(),
            websocket: WebSocketConfig::default(),
            interests: vec![],
        }
    }

    #[test]
    fn test_wildcard_cors() {
        let mut settings = test_settings();
        assert!(settings.allows_any_origin());

        settings.server.cors_origins = vec!["https://app.example.com".to_string()];
        assert!(!settings.allows_any_origin());

        settings.server.cors_origins.push("*".to_string());
        assert!(settings.allows_any_origin());
    }

    #[test]
    fn test_zero_channel_buffer_is_rejected() {
        let mut settings = test_settings();
        assert!(settings.validate().is_ok());

        settings.websocket.channel_buffer_size = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("channel_buffer_size"));
    }
}
