//! Memoization cache serialized by one exclusive lock.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{
    LockResult, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use log::{debug, trace, warn};

use super::api::Cache;

/// Memoization cache that runs the producer at most once per key.
///
/// Every [`Cache::get_or_set`] holds a single cache-wide lock for its whole duration, including the
/// time spent in the producer. Two callers can thus never both see a key as missing, and the
/// producer for a key runs at most once over the lifetime of the cache, no matter how many threads
/// ask for it at the same time.
///
/// The price is that calls to `get_or_set` for *different* keys are serialized too: while one
/// producer runs, every other `get_or_set` waits. Plain lookups with [`Cache::get`] only take the
/// store lock, which is never held across a producer, so they do not wait for one. Use
/// [`OptimisticMemoCache`](super::OptimisticMemoCache) when hits through `get_or_set` must not
/// contend and duplicate computation is acceptable.
///
/// If a producer fails or panics, nothing is stored for its key and the lock is released. The next
/// caller for that key computes it again.
#[derive(Debug)]
pub struct MemoCache<K, V> {
    /// Held for the whole of each `get_or_set`.
    serial: Mutex<()>,
    store: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for MemoCache<K, V> {
    fn default() -> Self {
        Self {
            serial: Mutex::default(),
            store: RwLock::default(),
        }
    }
}

/// Recovers a guard from a lock poisoned by a panicking producer.
///
/// Nothing is inserted before a producer returns, so the store is still consistent then.
fn recover<G>(result: LockResult<G>, clear: impl FnOnce()) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!("memo cache lock poisoned by a panicking producer, recovering");
        clear();
        poisoned.into_inner()
    })
}

impl<K, V> MemoCache<K, V> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cache with room for at least `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            serial: Mutex::default(),
            store: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Destroys the cache and retrieves the stored entries.
    pub fn into_inner(self) -> HashMap<K, V> {
        self.store
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn serialize(&self) -> MutexGuard<'_, ()> {
        recover(self.serial.lock(), || self.serial.clear_poison())
    }

    fn read_store(&self) -> RwLockReadGuard<'_, HashMap<K, V>> {
        recover(self.store.read(), || self.store.clear_poison())
    }

    fn write_store(&self) -> RwLockWriteGuard<'_, HashMap<K, V>> {
        recover(self.store.write(), || self.store.clear_poison())
    }
}

impl<K: Eq + Hash, V: Clone> Cache<K, V> for MemoCache<K, V> {
    fn get(&self, key: &K) -> Option<V> {
        self.read_store().get(key).cloned()
    }

    fn try_get_or_set<E, F>(&self, key: K, produce: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        // Nobody else can see this key as missing until this guard drops.
        let _serial = self.serialize();

        if let Some(value) = self.get(&key) {
            trace!("memo cache hit");
            return Ok(value);
        }

        let value = produce()?;
        debug!("memo cache miss, storing produced value");
        let _ = self.write_store().insert(key, value.clone());
        Ok(value)
    }

    fn len(&self) -> usize {
        self.read_store().len()
    }
}
