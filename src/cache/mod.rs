//! Memoization caches.
//!
//! Both caches implement [`Cache`] and differ only in their locking discipline:
//!
//! - [`MemoCache`] serializes every lookup-or-compute behind one lock. A producer runs at most
//!   once per key.
//! - [`OptimisticMemoCache`] checks under a shared lock and computes under an exclusive one.
//!   Hits never contend with each other, but racing misses may run a producer more than once.

mod api;
mod exclusive;
mod optimistic;

pub use api::{Cache, Key, Value};
pub use exclusive::MemoCache;
pub use optimistic::OptimisticMemoCache;
