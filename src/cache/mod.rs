use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

// Entries older than this many TTLs are no longer useful as a stale fallback
const STALE_HORIZON_TTLS: u32 = 12;

// Old entries are swept once the map grows past this
const SWEEP_THRESHOLD: usize = 1_000;

struct Entry<V> {
    value: V,
    fetched_at: Instant,
}

/// Per-key response cache with a freshness TTL and a re-fetch cooldown.
///
/// A cached value is served only when the caller does not force a refresh,
/// the last fetch is within the cooldown and the entry is within the TTL.
/// Anything else goes back to the store. Expired entries are kept so a
/// failed refresh can still fall back to them through [`TtlCache::stale`],
/// until they pass the stale horizon and an insert sweeps them out.
pub struct TtlCache<K, V> {
    ttl: Duration,
    cooldown: Duration,
    entries: RwLock<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration, cooldown: Duration) -> Self {
        Self {
            ttl,
            cooldown,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn fresh(&self, key: &K, force: bool) -> Option<V> {
        self.fresh_at(key, force, Instant::now()).await
    }

    pub async fn fresh_at(&self, key: &K, force: bool, now: Instant) -> Option<V> {
        if force {
            return None;
        }
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        let age = now.saturating_duration_since(entry.fetched_at);
        (age < self.cooldown && age < self.ttl).then(|| entry.value.clone())
    }

    /// Last stored value regardless of age
    pub async fn stale(&self, key: &K) -> Option<V> {
        self.entries.read().await.get(key).map(|e| e.value.clone())
    }

    pub async fn insert(&self, key: K, value: V) {
        self.insert_at(key, value, Instant::now()).await
    }

    pub async fn insert_at(&self, key: K, value: V, now: Instant) {
        let mut entries = self.entries.write().await;
        if entries.len() >= SWEEP_THRESHOLD {
            let horizon = self.ttl * STALE_HORIZON_TTLS;
            entries.retain(|_, e| now.saturating_duration_since(e.fetched_at) < horizon);
        }
        entries.insert(key, Entry { value, fetched_at: now });
    }

    pub async fn invalidate(&self, key: &K) {
        self.entries.write().await.remove(key);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> TtlCache<u32, &'static str> {
        TtlCache::new(Duration::from_secs(300), Duration::from_secs(30))
    }

    #[tokio::test]
    async fn serves_within_cooldown() {
        let cache = cache();
        let t0 = Instant::now();
        cache.insert_at(1, "holdings", t0).await;

        assert_eq!(cache.fresh_at(&1, false, t0 + Duration::from_secs(29)).await, Some("holdings"));
        assert_eq!(cache.fresh_at(&1, false, t0 + Duration::from_secs(30)).await, None);
        assert_eq!(cache.fresh_at(&2, false, t0).await, None);
    }

    #[tokio::test]
    async fn force_bypasses_cache() {
        let cache = cache();
        let t0 = Instant::now();
        cache.insert_at(1, "holdings", t0).await;
        assert_eq!(cache.fresh_at(&1, true, t0).await, None);
    }

    #[tokio::test]
    async fn ttl_caps_cooldown() {
        let cache: TtlCache<u32, u8> = TtlCache::new(Duration::from_secs(10), Duration::from_secs(60));
        let t0 = Instant::now();
        cache.insert_at(1, 7, t0).await;
        assert_eq!(cache.fresh_at(&1, false, t0 + Duration::from_secs(11)).await, None);
    }

    #[tokio::test]
    async fn insert_sweeps_entries_past_the_stale_horizon() {
        let cache: TtlCache<usize, u8> = TtlCache::new(Duration::from_secs(300), Duration::from_secs(30));
        let t0 = Instant::now();
        for user in 0..SWEEP_THRESHOLD {
            cache.insert_at(user, 1, t0).await;
        }
        let recent = t0 + Duration::from_secs(300);
        cache.insert_at(SWEEP_THRESHOLD, 2, recent).await;
        assert_eq!(cache.len().await, SWEEP_THRESHOLD + 1, "nothing is old enough yet");

        let later = t0 + Duration::from_secs(300 * STALE_HORIZON_TTLS as u64 + 1);
        cache.insert_at(SWEEP_THRESHOLD + 1, 3, later).await;
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.stale(&SWEEP_THRESHOLD).await, Some(2));
        assert!(cache.stale(&0).await.is_none());
    }

    #[tokio::test]
    async fn stale_survives_expiry_but_not_invalidation() {
        let cache = cache();
        let t0 = Instant::now();
        cache.insert_at(1, "old", t0).await;
        assert_eq!(cache.fresh_at(&1, false, t0 + Duration::from_secs(600)).await, None);
        assert_eq!(cache.stale(&1).await, Some("old"));

        cache.invalidate(&1).await;
        assert!(cache.stale(&1).await.is_none());
        assert!(cache.is_empty().await);
    }
}
