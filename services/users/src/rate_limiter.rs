//! Per-client request rate limiter

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Number of tracked clients above which expired windows are swept
const SWEEP_THRESHOLD: usize = 10_000;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of requests allowed per window
    pub max_requests: u32,
    /// Length of the window
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(15 * 60),
        }
    }
}

/// Rate limiter entry
#[derive(Debug)]
struct RateLimiterEntry {
    /// Requests seen in the current window
    requests: u32,
    /// Start of the current window
    window_start: Instant,
}

/// Fixed-window rate limiter keyed by client address
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, RateLimiterEntry>>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count a request from `key` and report whether it is within the limit
    pub async fn is_allowed(&self, key: &str) -> bool {
        self.is_allowed_at(key, Instant::now()).await
    }

    async fn is_allowed_at(&self, key: &str, now: Instant) -> bool {
        let mut entries = self.entries.lock().await;

        if entries.len() > SWEEP_THRESHOLD {
            let window = self.config.window;
            entries.retain(|_, entry| now.duration_since(entry.window_start) < window);
            debug!("Rate limiter swept, {} clients tracked", entries.len());
        }

        let entry = entries.entry(key.to_string()).or_insert(RateLimiterEntry {
            requests: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= self.config.window {
            entry.requests = 0;
            entry.window_start = now;
        }

        if entry.requests >= self.config.max_requests {
            warn!("Rate limit exceeded for {}", key);
            return false;
        }

        entry.requests += 1;
        true
    }

    /// Get the rate limiter configuration
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window: Duration) -> RateLimiter {
        RateLimiter::new(RateLimiterConfig {
            max_requests,
            window,
        })
    }

    #[tokio::test]
    async fn test_blocks_after_max_requests() {
        let limiter = limiter(3, Duration::from_secs(60));
        let now = Instant::now();

        for _ in 0..3 {
            assert!(limiter.is_allowed_at("10.0.0.1", now).await);
        }
        assert!(!limiter.is_allowed_at("10.0.0.1", now).await);
        assert!(limiter.is_allowed_at("10.0.0.2", now).await);
    }

    #[tokio::test]
    async fn test_window_resets() {
        let limiter = limiter(1, Duration::from_secs(60));
        let start = Instant::now();

        assert!(limiter.is_allowed_at("client", start).await);
        assert!(!limiter.is_allowed_at("client", start + Duration::from_secs(59)).await);
        assert!(limiter.is_allowed_at("client", start + Duration::from_secs(60)).await);
    }

    #[test]
    fn test_default_config() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.max_requests, 100);
        assert_eq!(config.window, Duration::from_millis(900_000));
    }
}
