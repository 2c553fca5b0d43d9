use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::metrics::RATELIMIT_TRACKED_ORIGINS;
use crate::presence::PresenceHub;

/// Background task that drops rate-limit windows whose attempts have all expired
pub struct RateLimitCleanupTask {
    interval: Duration,
    hub: Arc<PresenceHub>,
    shutdown: broadcast::Receiver<()>,
}

impl RateLimitCleanupTask {
    pub fn new(interval_secs: u64, hub: Arc<PresenceHub>, shutdown: broadcast::Receiver<()>) -> Self {
        Self {
            interval: Duration::from_secs(interval_secs.max(1)),
            hub,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let mut cleanup_timer = tokio::time::interval(self.interval);

        // Skip immediate first tick
        cleanup_timer.tick().await;

        tracing::info!(
            cleanup_interval_secs = self.interval.as_secs(),
            "Rate limit cleanup task started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Rate limit cleanup task received shutdown signal");
                    break;
                }
                _ = cleanup_timer.tick() => {
                    self.sweep();
                }
            }
        }

        tracing::info!("Rate limit cleanup task stopped");
    }

    fn sweep(&self) -> usize {
        let limiter = self.hub.rate_limiter();
        let removed = limiter.cleanup_stale(Utc::now().timestamp_millis());
        let tracked = limiter.stats().tracked_origins;
        RATELIMIT_TRACKED_ORIGINS.set(tracked as i64);

        if removed > 0 {
            tracing::debug!(removed, tracked, "Dropped idle rate limit windows");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PresenceConfig;
    use crate::connection_manager::ConnectionManager;
    use crate::store::MemoryStore;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::sync::mpsc;

    fn hub() -> Arc<PresenceHub> {
        Arc::new(PresenceHub::new(
            &PresenceConfig::default(),
            Arc::new(ConnectionManager::new()),
            Arc::new(MemoryStore::new()),
        ))
    }

    #[tokio::test]
    async fn test_sweep_drops_expired_windows() {
        let hub = hub();
        let (tx, _rx) = mpsc::channel(4);
        let long_ago = Utc::now().timestamp_millis() - 120_000;
        hub.connect_at(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)), tx, long_ago)
            .unwrap();
        assert_eq!(hub.rate_limiter().stats().tracked_origins, 1);

        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = RateLimitCleanupTask::new(60, hub.clone(), shutdown_rx);
        assert_eq!(task.sweep(), 1);
        assert_eq!(hub.rate_limiter().stats().tracked_origins, 0);
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = RateLimitCleanupTask::new(60, hub(), shutdown_rx);
        let handle = tokio::spawn(task.run());

        tokio::task::yield_now().await;
        shutdown_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("task did not stop")
            .unwrap();
    }
}
