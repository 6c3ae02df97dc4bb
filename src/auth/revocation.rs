use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// In-memory TTL set of revoked token fingerprints.
///
/// Entries expire lazily on lookup and are physically evicted by the
/// background sweeper, so a revocation never outlives the token it
/// covers by more than one sweep interval.
#[derive(Clone, Default)]
pub struct RevocationCache {
    entries: Arc<RwLock<HashMap<String, Instant>>>,
}

impl RevocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, fingerprint: String, ttl: Duration) {
        let deadline = Instant::now() + ttl;
        self.entries.write().await.insert(fingerprint, deadline);
    }

    pub async fn contains(&self, fingerprint: &str) -> bool {
        match self.entries.read().await.get(fingerprint) {
            Some(deadline) => *deadline > Instant::now(),
            None => false,
        }
    }

    pub async fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.write().await.retain(|_, deadline| *deadline > now);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Periodic eviction task; runs for the lifetime of the process.
    pub fn spawn_sweeper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                cache.purge_expired().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn revoked_until_ttl_elapses() {
        let cache = RevocationCache::new();
        cache.insert("fp".into(), Duration::from_secs(60)).await;

        assert!(cache.contains("fp").await);
        assert!(!cache.contains("other").await);
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let cache = RevocationCache::new();
        cache.insert("fp".into(), Duration::from_millis(10)).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!cache.contains("fp").await);

        // Still physically present until a purge runs.
        assert_eq!(cache.len().await, 1);
        cache.purge_expired().await;
        assert!(cache.is_empty().await);
    }
}
