//! Sliding-window rate limiting for login code requests
//!
//! - Per email address: 3 code requests per 10 minutes
//! - Per IP address: 10 requests per minute

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Counts events per key within a sliding time window
pub struct WindowLimiter<K> {
    max: usize,
    window: Duration,
    hits: Arc<RwLock<HashMap<K, Vec<DateTime<Utc>>>>>,
}

impl<K: Eq + Hash + Clone> WindowLimiter<K> {
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            max,
            window,
            hits: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Check whether `key` already used up its allowance
    pub async fn is_limited(&self, key: &K) -> bool {
        let cutoff = Utc::now() - self.window;
        let mut hits = self.hits.write().await;
        match hits.get_mut(key) {
            Some(times) => {
                times.retain(|time| *time > cutoff);
                times.len() >= self.max
            }
            None => false,
        }
    }

    /// Record one event for `key`
    pub async fn record(&self, key: K) {
        let mut hits = self.hits.write().await;
        hits.entry(key).or_default().push(Utc::now());
    }

    /// Check and record in one step; returns false when the key is limited
    pub async fn try_acquire(&self, key: K) -> bool {
        let cutoff = Utc::now() - self.window;
        let mut hits = self.hits.write().await;
        let times = hits.entry(key).or_default();
        times.retain(|time| *time > cutoff);
        if times.len() >= self.max {
            return false;
        }
        times.push(Utc::now());
        true
    }

    pub async fn clear(&self, key: &K) {
        self.hits.write().await.remove(key);
    }

    /// Drop expired entries
    pub async fn cleanup(&self) {
        let cutoff = Utc::now() - self.window;
        let mut hits = self.hits.write().await;
        hits.retain(|_, times| {
            times.retain(|time| *time > cutoff);
            !times.is_empty()
        });
    }

    pub async fn tracked_keys(&self) -> usize {
        self.hits.read().await.len()
    }
}

/// Rate limiter guarding the login code endpoint
pub struct LoginRateLimiter {
    email: WindowLimiter<String>,
    ip: WindowLimiter<IpAddr>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self {
            email: WindowLimiter::new(3, Duration::minutes(10)),
            ip: WindowLimiter::new(10, Duration::minutes(1)),
        }
    }

    /// Record a code request for `email`, or return false when over the limit
    pub async fn try_email(&self, email: &str) -> bool {
        self.email.try_acquire(email.trim().to_lowercase()).await
    }

    /// Record a request from `ip`, or return false when over the limit
    pub async fn try_ip(&self, ip: IpAddr) -> bool {
        self.ip.try_acquire(ip).await
    }

    /// Forget an address after a successful login
    pub async fn clear_email(&self, email: &str) {
        self.email.clear(&email.trim().to_lowercase()).await;
    }

    /// Clean up old entries (called periodically)
    pub async fn cleanup(&self) {
        self.email.cleanup().await;
        self.ip.cleanup().await;
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_email_rate_limit() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..3 {
            assert!(limiter.try_email("editor@example.com").await);
        }
        assert!(!limiter.try_email("editor@example.com").await);
        assert!(limiter.try_email("other@example.com").await);

        limiter.clear_email("editor@example.com").await;
        assert!(limiter.try_email("editor@example.com").await);
    }

    #[tokio::test]
    async fn test_ip_rate_limit() {
        let limiter = LoginRateLimiter::new();
        let ip = IpAddr::from_str("127.0.0.1").unwrap();

        for _ in 0..10 {
            assert!(limiter.try_ip(ip).await);
        }
        assert!(!limiter.try_ip(ip).await);
    }

    #[tokio::test]
    async fn test_case_insensitive_email() {
        let limiter = LoginRateLimiter::new();

        assert!(limiter.try_email("Editor@Example.com").await);
        assert!(limiter.try_email("editor@example.com").await);
        assert!(limiter.try_email(" EDITOR@EXAMPLE.COM ").await);
        assert!(!limiter.try_email("editor@example.com").await);
    }

    #[tokio::test]
    async fn test_window_expiry_and_cleanup() {
        let limiter: WindowLimiter<&str> = WindowLimiter::new(1, Duration::milliseconds(50));
        assert!(limiter.try_acquire("k").await);
        assert!(limiter.is_limited(&"k").await);

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        assert!(!limiter.is_limited(&"k").await);

        limiter.record("k").await;
        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        limiter.cleanup().await;
        assert_eq!(limiter.tracked_keys().await, 0);
    }
}
