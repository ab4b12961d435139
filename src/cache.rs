use std::future::Future;
use std::hash::Hash;

use dashmap::DashMap;
use tokio::time::{Duration, Instant};

use crate::errors::ReportError;

/// Entry stored in the map with its creation time.
#[derive(Clone)]
pub(crate) struct CacheEntry<V> {
    value: V,
    pub(crate) created_at: Instant,
}

/// Result of [`ResultCache::get_or_compute`]. On failure `value` is the
/// empty value and `error` says why; nothing is cached in that case.
#[derive(Debug, Clone)]
pub struct CacheOutcome<V> {
    pub value: V,
    pub hit: bool,
    pub error: Option<ReportError>,
}

/// TTL memoization of computed reports.
///
/// An entry is valid while `now - created_at < ttl`. Expired entries are
/// treated as absent on lookup and dropped lazily; `evict_expired()` compacts
/// them in bulk. There is no size bound.
pub struct ResultCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    errors: DashMap<K, String>,
    ttl: Duration,
}

impl<K, V> ResultCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Default,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            errors: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the valid entry for `key`, or run `compute` and store its
    /// successful result. A failed computation is not stored; its
    /// user-facing message is kept for [`ResultCache::last_error`].
    pub async fn get_or_compute<F, Fut>(&self, key: K, compute: F) -> CacheOutcome<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ReportError>>,
    {
        if let Some(value) = self.get(&key) {
            return CacheOutcome {
                value,
                hit: true,
                error: None,
            };
        }

        match compute().await {
            Ok(value) => {
                self.errors.remove(&key);
                self.insert(key, value.clone());
                CacheOutcome {
                    value,
                    hit: false,
                    error: None,
                }
            }
            Err(err) => {
                self.errors.insert(key, err.user_message());
                CacheOutcome {
                    value: V::default(),
                    hit: false,
                    error: Some(err),
                }
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        if let Some(entry) = self.entries.get(key) {
            if entry.created_at.elapsed() < self.ttl {
                return Some(entry.value.clone());
            }
        }
        // re-checked under the shard lock so a concurrent insert survives
        let ttl = self.ttl;
        self.entries
            .remove_if(key, |_, entry| entry.created_at.elapsed() >= ttl);
        None
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: Instant::now(),
            },
        );
    }

    /// Message of the last failed computation for `key`, cleared by the next
    /// success or by [`ResultCache::invalidate_all`].
    pub fn last_error(&self, key: &K) -> Option<String> {
        self.errors.get(key).map(|e| e.value().clone())
    }

    /// Drop the entry for `key` and its last error. Returns whether an entry
    /// was stored.
    pub fn invalidate(&self, key: &K) -> bool {
        self.errors.remove(key);
        self.entries.remove(key).is_some()
    }

    /// Drop every entry immediately. Returns how many were dropped.
    pub fn invalidate_all(&self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        self.errors.clear();
        dropped
    }

    /// Remove all expired entries. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut evicted = 0;
        self.entries.retain(|_, entry| {
            let keep = entry.created_at.elapsed() < ttl;
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(300);

    async fn compute_counted(
        cache: &ResultCache<String, Vec<u32>>,
        key: &str,
        calls: &AtomicUsize,
    ) -> CacheOutcome<Vec<u32>> {
        cache
            .get_or_compute(key.to_string(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![1, 2, 3])
            })
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_within_ttl_hits() {
        let cache = ResultCache::new(TTL);
        let calls = AtomicUsize::new(0);

        let first = compute_counted(&cache, "w", &calls).await;
        tokio::time::advance(Duration::from_secs(299)).await;
        let second = compute_counted(&cache, "w", &calls).await;

        assert!(!first.hit);
        assert!(second.hit);
        assert_eq!(second.value, vec![1, 2, 3]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recomputes_after_ttl() {
        let cache = ResultCache::new(TTL);
        let calls = AtomicUsize::new(0);

        compute_counted(&cache, "w", &calls).await;
        tokio::time::advance(TTL).await;
        let again = compute_counted(&cache, "w", &calls).await;

        assert!(!again.hit);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_all_forces_recompute() {
        let cache = ResultCache::new(TTL);
        let calls = AtomicUsize::new(0);

        compute_counted(&cache, "a", &calls).await;
        compute_counted(&cache, "b", &calls).await;
        assert_eq!(cache.invalidate_all(), 2);
        assert!(cache.is_empty());

        compute_counted(&cache, "a", &calls).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let cache = ResultCache::new(TTL);
        let calls = AtomicUsize::new(0);

        compute_counted(&cache, "a", &calls).await;
        compute_counted(&cache, "b", &calls).await;
        compute_counted(&cache, "a", &calls).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached_and_message_is_kept() {
        let cache: ResultCache<String, Vec<u32>> = ResultCache::new(TTL);

        let out = cache
            .get_or_compute("w".to_string(), || async {
                Err(ReportError::Connection("refused".into()))
            })
            .await;

        assert!(out.value.is_empty());
        assert!(matches!(out.error, Some(ReportError::Connection(_))));
        assert!(cache.is_empty());
        let msg = cache.last_error(&"w".to_string()).unwrap();
        assert!(!msg.contains("refused"));

        let calls = AtomicUsize::new(0);
        let retry = compute_counted(&cache, "w", &calls).await;
        assert!(!retry.hit);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.last_error(&"w".to_string()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_expired() {
        let cache = ResultCache::new(TTL);
        cache.insert("old".to_string(), vec![1]);
        tokio::time::advance(Duration::from_secs(200)).await;
        cache.insert("new".to_string(), vec![2]);
        tokio::time::advance(Duration::from_secs(150)).await;

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.evict_expired(), 1);
        assert_eq!(cache.get(&"new".to_string()), Some(vec![2]));
        assert_eq!(cache.get(&"old".to_string()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_lookup_drops_entry() {
        let cache = ResultCache::new(TTL);
        cache.insert("w".to_string(), vec![1]);
        tokio::time::advance(TTL).await;

        assert_eq!(cache.get(&"w".to_string()), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinserted_entry_survives_lookup() {
        let cache = ResultCache::new(TTL);
        cache.insert("w".to_string(), vec![1]);
        tokio::time::advance(TTL).await;
        cache.insert("w".to_string(), vec![2]);

        assert_eq!(cache.get(&"w".to_string()), Some(vec![2]));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_single_key() {
        let cache = ResultCache::new(TTL);
        cache.insert("a".to_string(), vec![1]);
        cache.insert("b".to_string(), vec![2]);

        assert!(cache.invalidate(&"a".to_string()));
        assert!(!cache.invalidate(&"a".to_string()));
        assert_eq!(cache.get(&"b".to_string()), Some(vec![2]));
        assert_eq!(cache.len(), 1);
    }

    /// Inserts racing with eviction must not make the count underflow.
    #[test]
    fn test_evict_expired_with_concurrent_inserts() {
        let cache: ResultCache<String, Vec<u32>> = ResultCache::new(Duration::from_secs(3600));

        std::thread::scope(|scope| {
            for t in 0..4 {
                let cache = &cache;
                scope.spawn(move || {
                    for i in 0..2_000 {
                        cache.insert(format!("{}-{}", t, i), vec![i]);
                    }
                });
            }
            for _ in 0..500 {
                assert_eq!(cache.evict_expired(), 0);
            }
        });

        assert_eq!(cache.len(), 8_000);
    }
}
