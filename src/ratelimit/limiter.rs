//! Sliding-window connection limiter

use std::collections::VecDeque;
use std::net::IpAddr;

use dashmap::DashMap;
use serde::Serialize;

use super::config::RateLimitConfig;

/// Tracks recent connection attempts per origin and admits or rejects new ones.
pub struct ConnectionRateLimiter {
    /// origin -> attempt timestamps (Unix ms), oldest first
    windows: DashMap<IpAddr, VecDeque<i64>>,
    config: RateLimitConfig,
}

impl ConnectionRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            config,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check a connection attempt from `origin` at `now_ms`.
    ///
    /// Entries at least one window old are discarded first. A rejected attempt
    /// is not recorded, so a rejected origin recovers as soon as its oldest
    /// admitted attempt leaves the window.
    pub fn admit(&self, origin: IpAddr, now_ms: i64) -> bool {
        if !self.config.enabled {
            return true;
        }

        let window_ms = self.config.window_ms;
        let mut window = self.windows.entry(origin).or_default();

        while let Some(&oldest) = window.front() {
            if now_ms - oldest >= window_ms {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() >= self.config.max_attempts {
            tracing::debug!(
                origin = %origin,
                attempts = window.len(),
                limit = self.config.max_attempts,
                "Connection attempt rejected by rate limiter"
            );
            return false;
        }

        window.push_back(now_ms);
        true
    }

    /// Number of attempts currently recorded for `origin` (unpruned).
    pub fn attempts(&self, origin: IpAddr) -> usize {
        self.windows.get(&origin).map(|w| w.len()).unwrap_or(0)
    }

    /// Drop origins whose every recorded attempt has left the window.
    pub fn cleanup_stale(&self, now_ms: i64) -> usize {
        let window_ms = self.config.window_ms;
        let before = self.windows.len();

        self.windows.retain(|_, window| {
            window.retain(|&t| now_ms - t < window_ms);
            !window.is_empty()
        });

        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            tracing::debug!(
                removed = removed,
                tracked_origins = self.windows.len(),
                "Cleaned up idle rate limit windows"
            );
        }
        removed
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            enabled: self.config.enabled,
            tracked_origins: self.windows.len(),
            window_seconds: (self.config.window_ms / 1000) as u64,
            max_attempts: self.config.max_attempts,
        }
    }
}

/// Statistics about the rate limiter
#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterStats {
    pub enabled: bool,
    pub tracked_origins: usize,
    pub window_seconds: u64,
    pub max_attempts: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn limiter() -> ConnectionRateLimiter {
        ConnectionRateLimiter::new(RateLimitConfig::default())
    }

    #[test]
    fn test_rate_limiter_disabled() {
        let limiter = ConnectionRateLimiter::new(RateLimitConfig {
            enabled: false,
            ..Default::default()
        });
        let ip = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));

        for i in 0..100 {
            assert!(limiter.admit(ip, i));
        }
        assert_eq!(limiter.attempts(ip), 0);
    }

    #[test]
    fn test_sixth_attempt_in_window_rejected() {
        let limiter = limiter();
        let ip = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1));

        for i in 0..5 {
            assert!(limiter.admit(ip, i * 1_000));
        }
        assert!(!limiter.admit(ip, 59_999));
        // Rejection does not record the attempt
        assert_eq!(limiter.attempts(ip), 5);
    }

    #[test]
    fn test_admitted_once_oldest_expires() {
        let limiter = limiter();
        let ip = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 2));

        for i in 0..5 {
            assert!(limiter.admit(ip, i * 1_000));
        }
        assert!(!limiter.admit(ip, 59_000));
        // The attempt at t=0 is exactly one window old now
        assert!(limiter.admit(ip, 60_000));
        assert!(!limiter.admit(ip, 60_500));
        assert!(limiter.admit(ip, 61_000));
    }

    #[test]
    fn test_window_never_holds_expired_entries() {
        let limiter = limiter();
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

        assert!(limiter.admit(ip, 0));
        assert!(limiter.admit(ip, 10_000));
        assert!(limiter.admit(ip, 200_000));
        assert_eq!(limiter.attempts(ip), 1);
    }

    #[test]
    fn test_origins_are_independent() {
        let limiter = limiter();
        let a = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let b = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

        for i in 0..5 {
            assert!(limiter.admit(a, i));
        }
        assert!(!limiter.admit(a, 10));
        assert!(limiter.admit(b, 10));
    }

    #[test]
    fn test_cleanup_stale_windows() {
        let limiter = limiter();
        let a = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let b = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

        limiter.admit(a, 0);
        limiter.admit(b, 50_000);

        let removed = limiter.cleanup_stale(70_000);
        assert_eq!(removed, 1);
        assert_eq!(limiter.attempts(a), 0);
        assert_eq!(limiter.attempts(b), 1);
        assert_eq!(limiter.stats().tracked_origins, 1);
    }
}
