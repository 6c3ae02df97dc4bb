//! Fixed-window rate limiting.
//!
//! One counter per key and one-minute windows: the first charged
//! check in a window sets count = 1, later checks increment until
//! the limit, and a check after the window elapses resets it. Two
//! key namespaces are kept apart so an authenticated principal and
//! an address-identified stranger never share a counter.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct WindowEntry {
    count: i64,
    window_start: Instant,
    limit: i64,
    last_access: Instant,
}

#[derive(Default)]
struct Tables {
    ip: HashMap<String, WindowEntry>,
    user: HashMap<i64, WindowEntry>,
}

pub struct RateLimiter {
    tables: Mutex<Tables>,
    default_limit: i64,
}

impl RateLimiter {
    pub fn new(default_limit: i64) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            default_limit,
        }
    }

    /// Charged check for an authenticated principal. `service_limit`
    /// applies when positive, otherwise the configured default.
    pub async fn check_user(&self, user_id: i64, service_limit: i64) -> bool {
        let limit = self.effective_limit(service_limit);
        let mut tables = self.tables.lock().await;
        Self::check(&mut tables.user, user_id, limit)
    }

    /// Charged check keyed by source address, for anonymous callers.
    pub async fn check_ip(&self, addr: &str, service_limit: i64) -> bool {
        let limit = self.effective_limit(service_limit);
        let mut tables = self.tables.lock().await;
        Self::check(&mut tables.ip, addr.to_string(), limit)
    }

    fn effective_limit(&self, service_limit: i64) -> i64 {
        if service_limit > 0 {
            service_limit
        } else {
            self.default_limit
        }
    }

    fn check<K: Eq + Hash>(entries: &mut HashMap<K, WindowEntry>, key: K, limit: i64) -> bool {
        let now = Instant::now();

        match entries.get_mut(&key) {
            Some(entry) if now.duration_since(entry.window_start) <= WINDOW => {
                entry.last_access = now;
                if entry.count >= entry.limit {
                    return false;
                }
                entry.count += 1;
                true
            }
            _ => {
                // New key, or the previous window elapsed.
                entries.insert(
                    key,
                    WindowEntry {
                        count: 1,
                        window_start: now,
                        limit,
                        last_access: now,
                    },
                );
                // A zero (or negative) limit admits nothing, not
                // even the first request of a window.
                limit > 0
            }
        }
    }

    /// Drops entries idle for longer than `max_age`.
    pub async fn cleanup_expired(&self, max_age: Duration) {
        let now = Instant::now();
        let mut tables = self.tables.lock().await;
        tables
            .ip
            .retain(|_, entry| now.duration_since(entry.last_access) <= max_age);
        tables
            .user
            .retain(|_, entry| now.duration_since(entry.last_access) <= max_age);
    }

    pub async fn tracked_keys(&self) -> usize {
        let tables = self.tables.lock().await;
        tables.ip.len() + tables.user.len()
    }
}

/// Background sweeper evicting idle counters on a fixed cadence.
pub fn spawn_sweeper(
    limiter: std::sync::Arc<RateLimiter>,
    interval: Duration,
    max_age: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            limiter.cleanup_expired(max_age).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_limit_then_denies() {
        let limiter = RateLimiter::new(60);

        assert!(limiter.check_ip("10.0.0.1", 2).await);
        assert!(limiter.check_ip("10.0.0.1", 2).await);
        assert!(!limiter.check_ip("10.0.0.1", 2).await);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = RateLimiter::new(60);

        assert!(limiter.check_ip("10.0.0.1", 1).await);
        assert!(!limiter.check_ip("10.0.0.1", 1).await);
        assert!(limiter.check_ip("10.0.0.2", 1).await);
        assert!(limiter.check_user(1, 1).await);
        assert!(!limiter.check_user(1, 1).await);
        assert!(limiter.check_user(2, 1).await);
    }

    #[tokio::test]
    async fn user_and_ip_namespaces_do_not_collide() {
        let limiter = RateLimiter::new(60);

        assert!(limiter.check_user(42, 1).await);
        // Same numeric key in the address namespace is unaffected.
        assert!(limiter.check_ip("42", 1).await);
    }

    #[tokio::test]
    async fn non_positive_service_limit_uses_default() {
        let limiter = RateLimiter::new(2);

        assert!(limiter.check_ip("10.0.0.9", 0).await);
        assert!(limiter.check_ip("10.0.0.9", 0).await);
        assert!(!limiter.check_ip("10.0.0.9", 0).await);
    }

    #[tokio::test]
    async fn zero_default_rejects_everything() {
        let limiter = RateLimiter::new(0);
        assert!(!limiter.check_ip("10.0.0.1", 0).await);
    }

    #[tokio::test]
    async fn cleanup_drops_idle_entries() {
        let limiter = RateLimiter::new(60);
        limiter.check_ip("10.0.0.1", 5).await;
        limiter.check_user(7, 5).await;
        assert_eq!(limiter.tracked_keys().await, 2);

        tokio::time::sleep(Duration::from_millis(20)).await;
        limiter.cleanup_expired(Duration::from_millis(1)).await;
        assert_eq!(limiter.tracked_keys().await, 0);
    }
}
