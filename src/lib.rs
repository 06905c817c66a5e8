//! Thread-safe in-process memoization caches.

#![warn(missing_docs, missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cache;

pub use cache::{Cache, Key, MemoCache, OptimisticMemoCache, Value};
