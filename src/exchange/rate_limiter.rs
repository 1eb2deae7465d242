//! Client-side request spacing
//!
//! Every adapter awaits [`RateLimiter::acquire`] before a request. Calls are
//! spaced at least `min_interval` apart; clones share the same schedule.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Configuration for the rate limiter
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterConfig {
    /// Minimum time between two consecutive requests
    pub min_interval: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(100),
        }
    }
}

impl RateLimiterConfig {
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Spacing derived from a requests-per-second budget
    pub fn with_rate(self, requests_per_second: u32) -> Self {
        let rps = requests_per_second.max(1);
        self.with_min_interval(Duration::from_secs(1) / rps)
    }
}

/// Spaces requests `min_interval` apart
#[derive(Debug, Clone)]
pub struct RateLimiter {
    next_slot: Arc<Mutex<Option<Instant>>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            next_slot: Arc::new(Mutex::new(None)),
            min_interval: config.min_interval,
        }
    }

    /// Limiter that never waits
    pub fn unlimited() -> Self {
        Self::new(RateLimiterConfig::default().with_min_interval(Duration::ZERO))
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the next request slot is free, then claim it
    pub async fn acquire(&self) {
        let wait_until = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next_slot {
                Some(at) if at > now => at,
                _ => now,
            };
            *next_slot = Some(slot + self.min_interval);
            slot
        };

        if wait_until > Instant::now() {
            sleep_until(wait_until).await;
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.min_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_with_rate() {
        let config = RateLimiterConfig::default().with_rate(20);
        assert_eq!(config.min_interval, Duration::from_millis(50));

        let zero = RateLimiterConfig::default().with_rate(0);
        assert_eq!(zero.min_interval, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_first_acquire_is_immediate() {
        let limiter = RateLimiter::new(
            RateLimiterConfig::default().with_min_interval(Duration::from_secs(5)),
        );
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_consecutive_acquires_are_spaced() {
        let limiter = RateLimiter::new(
            RateLimiterConfig::default().with_min_interval(Duration::from_millis(30)),
        );
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_clone_shares_schedule() {
        let first = RateLimiter::new(
            RateLimiterConfig::default().with_min_interval(Duration::from_millis(40)),
        );
        let second = first.clone();
        let start = Instant::now();
        first.acquire().await;
        second.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_unlimited_never_waits() {
        let limiter = RateLimiter::unlimited();
        let start = Instant::now();
        for _ in 0..10 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
