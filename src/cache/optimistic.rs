//! Memoization cache with a shared read path.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, trace, warn};

use super::api::Cache;

/// Memoization cache optimized for hits.
///
/// [`Cache::get_or_set`] first looks the key up under a shared lock and returns right away if it
/// is present, so hits never wait for each other. Only a miss takes the exclusive lock, runs the
/// producer under it, and stores the result.
///
/// # Weaker guarantee
///
/// The presence check and the write are *not* one critical section. Callers that miss the same key
/// at the same time each end up running their producer in turn, and each overwrites the entry. The
/// producer for a key may therefore run more than once, the entry ends up holding the last write,
/// and a caller that returned early may have seen an earlier value. Use
/// [`MemoCache`](super::MemoCache) when the producer must run at most once per key.
///
/// As with [`MemoCache`](super::MemoCache), a failing or panicking producer stores nothing and the
/// next caller computes the key again.
#[derive(Debug)]
pub struct OptimisticMemoCache<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for OptimisticMemoCache<K, V> {
    fn default() -> Self {
        Self {
            inner: RwLock::default(),
        }
    }
}

impl<K, V> OptimisticMemoCache<K, V> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cache with room for at least `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Destroys the cache and retrieves the stored entries.
    pub fn into_inner(self) -> HashMap<K, V> {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn read_store(&self) -> RwLockReadGuard<'_, HashMap<K, V>> {
        self.inner.read().unwrap_or_else(|poisoned| {
            warn!("memo cache lock poisoned by a panicking producer, recovering");
            self.inner.clear_poison();
            poisoned.into_inner()
        })
    }

    // Poisoning happens before the insert, see `MemoCache::store`.
    fn write_store(&self) -> RwLockWriteGuard<'_, HashMap<K, V>> {
        self.inner.write().unwrap_or_else(|poisoned| {
            warn!("memo cache lock poisoned by a panicking producer, recovering");
            self.inner.clear_poison();
            poisoned.into_inner()
        })
    }
}

impl<K: Eq + Hash, V: Clone> Cache<K, V> for OptimisticMemoCache<K, V> {
    fn get(&self, key: &K) -> Option<V> {
        self.read_store().get(key).cloned()
    }

    fn try_get_or_set<E, F>(&self, key: K, produce: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(&key) {
            trace!("memo cache hit");
            return Ok(value);
        }

        // No re-check: another miss may have stored this key since, and is overwritten.
        let mut store = self.write_store();
        let value = produce()?;
        if store.insert(key, value.clone()).is_some() {
            debug!("memo cache miss raced with another producer, overwrote entry");
        } else {
            debug!("memo cache miss, stored produced value");
        }
        Ok(value)
    }

    fn len(&self) -> usize {
        self.read_store().len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread::scope;

    use super::super::api::{self, Cache, Key, Value};
    use super::OptimisticMemoCache;

    type StringCache = OptimisticMemoCache<Key, Value>;

    const NUM_THREADS: usize = 8;
    const NUM_KEYS: usize = 128;

    #[test]
    fn transparency() {
        api::tests::transparency::<StringCache>();
    }

    #[test]
    fn idempotent() {
        api::tests::idempotent::<StringCache>();
    }

    #[test]
    fn retry_after_error() {
        api::tests::retry_after_error::<StringCache>();
    }

    #[test]
    fn retry_after_panic() {
        api::tests::retry_after_panic::<StringCache>();
    }

    #[test]
    fn stress_sequential() {
        api::tests::stress_sequential::<StringCache>(4096);
    }

    #[test]
    fn concurrent_hits() {
        api::tests::concurrent_hits::<StringCache>();
    }

    #[test]
    fn race_bounded() {
        api::tests::race_bounded::<StringCache>();
    }

    #[test]
    fn concurrent_keys_consistent() {
        let cache = OptimisticMemoCache::<usize, usize>::new();
        let barrier = Barrier::new(NUM_THREADS);

        scope(|s| {
            for _ in 0..NUM_THREADS {
                let _ = s.spawn(|| {
                    let _ = barrier.wait();
                    for key in 0..NUM_KEYS {
                        assert_eq!(cache.get_or_set(key, || key + 1), key + 1);
                    }
                });
            }
        });

        let entries = cache.into_inner();
        assert_eq!(entries.len(), NUM_KEYS);
        assert!(entries.iter().all(|(k, v)| *v == k + 1));
    }
}
