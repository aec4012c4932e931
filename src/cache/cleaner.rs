use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::CacheManager;
use crate::task::TaskHandle;

/// Periodically runs [`CacheManager::sweep_expired`].
pub struct CacheCleaner {
    cache: Arc<CacheManager>,
    interval: Duration,
}

impl CacheCleaner {
    pub fn new(cache: Arc<CacheManager>, interval: Duration) -> Self {
        Self { cache, interval }
    }

    pub fn start(self) -> TaskHandle {
        info!("Starting cache cleaner with interval {:?}", self.interval);
        let cache = self.cache;
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                debug!("Running cache sweep cycle");
                if let Err(e) = cache.sweep_expired().await {
                    warn!("Cache sweep failed: {}", e);
                    cache.error_reporter().record("cache.sweep", &e);
                }
            }
        });

        TaskHandle::new("cache-cleaner", handle)
    }
}
