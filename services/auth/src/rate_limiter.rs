//! Rate limiter for preventing brute force login attempts

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Failed attempts allowed inside one window
    pub max_attempts: u32,
    /// Window over which failures are counted
    pub window: Duration,
    /// How long a key stays locked once it exceeds the limit
    pub lockout: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::from_secs(300),
            lockout: Duration::from_secs(900),
        }
    }
}

#[derive(Debug)]
struct Failures {
    count: u32,
    window_start: Instant,
    locked_until: Option<Instant>,
}

impl Failures {
    /// Expired lockout, or an unlocked window that has run out
    fn is_stale(&self, now: Instant, window: Duration) -> bool {
        match self.locked_until {
            Some(until) => now >= until,
            None => now.duration_since(self.window_start) >= window,
        }
    }
}

/// Per-key failed login tracker
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, Failures>>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether `key` may attempt a login right now
    pub async fn is_allowed(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let Some(locked_until) = entries.get(key).map(|entry| entry.locked_until) else {
            return true;
        };

        match locked_until {
            Some(until) if now < until => false,
            Some(_) => {
                entries.remove(key);
                true
            }
            None => true,
        }
    }

    /// Count a failed attempt, locking the key once the limit is reached
    pub async fn record_failure(&self, key: &str) {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let window = self.config.window;
        entries.retain(|_, entry| !entry.is_stale(now, window));

        let entry = entries.entry(key.to_string()).or_insert(Failures {
            count: 0,
            window_start: now,
            locked_until: None,
        });

        if now.duration_since(entry.window_start) >= self.config.window {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count += 1;
        if entry.count >= self.config.max_attempts {
            entry.locked_until = Some(now + self.config.lockout);
            warn!(
                "Locked {} for {} seconds after {} failed logins",
                key,
                self.config.lockout.as_secs(),
                entry.count
            );
        }
    }

    /// Forget failures for `key`, e.g. after a successful login
    pub async fn reset(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_attempts: u32, window: Duration, lockout: Duration) -> RateLimiter {
        RateLimiter::new(RateLimiterConfig {
            max_attempts,
            window,
            lockout,
        })
    }

    #[tokio::test]
    async fn locks_after_max_failures() {
        let limiter = limiter(3, Duration::from_secs(60), Duration::from_secs(60));

        for _ in 0..2 {
            limiter.record_failure("a@example.com").await;
            assert!(limiter.is_allowed("a@example.com").await);
        }
        limiter.record_failure("a@example.com").await;

        assert!(!limiter.is_allowed("a@example.com").await);
        assert!(limiter.is_allowed("b@example.com").await);
    }

    #[tokio::test]
    async fn reset_clears_failures() {
        let limiter = limiter(2, Duration::from_secs(60), Duration::from_secs(60));

        limiter.record_failure("a@example.com").await;
        limiter.reset("a@example.com").await;
        limiter.record_failure("a@example.com").await;

        assert!(limiter.is_allowed("a@example.com").await);
    }

    #[tokio::test]
    async fn lockout_expires() {
        let limiter = limiter(1, Duration::from_secs(60), Duration::from_millis(20));

        limiter.record_failure("a@example.com").await;
        assert!(!limiter.is_allowed("a@example.com").await);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(limiter.is_allowed("a@example.com").await);
    }

    #[tokio::test]
    async fn failures_outside_window_do_not_accumulate() {
        let limiter = limiter(2, Duration::from_millis(20), Duration::from_secs(60));

        limiter.record_failure("a@example.com").await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        limiter.record_failure("a@example.com").await;

        assert!(limiter.is_allowed("a@example.com").await);
    }

    #[tokio::test]
    async fn stale_entries_are_dropped() {
        let limiter = limiter(2, Duration::from_millis(20), Duration::from_millis(20));

        limiter.record_failure("unlocked@example.com").await;
        limiter.record_failure("locked@example.com").await;
        limiter.record_failure("locked@example.com").await;
        assert_eq!(limiter.entries.lock().await.len(), 2);

        tokio::time::sleep(Duration::from_millis(40)).await;
        limiter.record_failure("fresh@example.com").await;

        let entries = limiter.entries.lock().await;
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("fresh@example.com"));
    }
}
