//! Rate limiting configuration

use crate::config::PresenceConfig;

/// Configuration for connection rate limiting
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled
    pub enabled: bool,
    /// Trailing window length in milliseconds
    pub window_ms: i64,
    /// Attempts allowed per origin inside one window
    pub max_attempts: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 60_000,
            max_attempts: 5,
        }
    }
}

impl From<&PresenceConfig> for RateLimitConfig {
    fn from(config: &PresenceConfig) -> Self {
        Self {
            enabled: config.rate_limit_enabled,
            window_ms: (config.rate_limit_window_seconds as i64).saturating_mul(1000),
            max_attempts: config.max_connections_per_window,
        }
    }
}
