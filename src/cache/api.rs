use core::convert::Infallible;

/// Default key type.
pub type Key = String;

/// Default value type.
pub type Value = String;

/// Memoization cache interface.
///
/// A cache maps each key to the value a producer computed for it. Entries are only ever added:
/// there is no eviction, expiration or removal, so a cache grows for as long as it lives.
///
/// Implementations differ in how strongly they avoid running a producer twice for the same key.
/// See [`MemoCache`](super::MemoCache) and [`OptimisticMemoCache`](super::OptimisticMemoCache).
pub trait Cache<K, V> {
    /// Looks up `key` without computing anything.
    fn get(&self, key: &K) -> Option<V>;

    /// Returns the value of `key`, computing and storing it with `produce` if it is absent.
    ///
    /// If `produce` returns an error, nothing is stored for `key` and the error is returned as is.
    /// The next call for `key` runs its producer again. The same holds if `produce` panics.
    fn try_get_or_set<E, F>(&self, key: K, produce: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>;

    /// Returns the value of `key`, computing and storing it with `produce` if it is absent.
    fn get_or_set<F>(&self, key: K, produce: F) -> V
    where
        F: FnOnce() -> V,
    {
        match self.try_get_or_set(key, || Ok::<_, Infallible>(produce())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Returns the number of stored entries.
    fn len(&self) -> usize;

    /// Returns `true` if no entry has been stored yet.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
