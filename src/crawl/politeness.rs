//! Randomized politeness delay between requests

use crate::config::CrawlConfig;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Pause applied before every request to a crawled host
#[derive(Debug, Clone, Copy)]
pub struct Politeness {
    min: Duration,
    max: Duration,
}

impl Politeness {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    pub fn from_config(config: &CrawlConfig) -> Self {
        Self::new(
            Duration::from_millis(config.politeness_min_ms),
            Duration::from_millis(config.politeness_max_ms),
        )
    }

    /// Pick the next delay uniformly within bounds
    pub fn next_delay(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    /// Sleep for the next delay; returns false if cancelled first
    pub async fn wait(&self, token: &CancellationToken) -> bool {
        let delay = self.next_delay();
        if delay.is_zero() {
            return !token.is_cancelled();
        }

        trace!("Politeness delay: {:?}", delay);
        tokio::select! {
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}
