//! Read-through caching: memoize expensive per-key lookups for the process lifetime.
//!
//! Two strategies implement the [`ReadThrough`] trait:
//!
//! | Type            | Locking                               | Fetch runs             |
//! |-----------------|---------------------------------------|------------------------|
//! | [`Cache`]       | one reader/writer lock over the table | under the write lock   |
//! | [`KeyedCache`]  | short table lock + one mutex per key  | under that key's mutex |
//!
//! Both return the stored value for a warm key without calling the fetch
//! function, never cache a failed fetch, and never evict. [`Cache`] is the
//! simpler of the two but a miss on one key stalls every other key until the
//! fetch returns; [`KeyedCache`] only serializes callers of the same key.
//!
//! Entries are never removed: there is no eviction, expiry, or size bound.

use std::sync::atomic::{AtomicU64, Ordering};

mod keyed;
mod locked;

pub use keyed::KeyedCache;
pub use locked::Cache;

/// A concurrency-safe, get-or-compute memoization table.
///
/// Implementations are shared between worker threads behind an [`Arc`](std::sync::Arc),
/// so every operation takes `&self`.
pub trait ReadThrough<K, V>: Send + Sync {
    /// Return the value stored for `key`, calling `fetch` to produce and store it on a miss.
    fn get_with<F>(&self, key: K, fetch: F) -> V
    where
        F: FnOnce(&K) -> V,
    {
        match self.try_get_with(key, |k| Ok::<V, std::convert::Infallible>(fetch(k))) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Like [`get_with`](Self::get_with) for a fallible `fetch`.
    ///
    /// An `Err` is handed back to the caller and nothing is stored, so the next
    /// access for the same key calls `fetch` again.
    ///
    /// # Errors
    ///
    /// Returns whatever error `fetch` returns.
    fn try_get_with<F, E>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>;

    /// Return the stored value for `key` without filling it.
    fn get(&self, key: &K) -> Option<V>;

    /// Number of keys holding a value.
    fn len(&self) -> usize;

    /// Returns `true` if no key holds a value.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the hit and fetch counters.
    fn stats(&self) -> CacheStats;
}

/// Counters describing how a cache has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the table.
    pub hits: u64,
    /// Invocations of a fetch function, successful or not.
    pub fetches: u64,
}

// Lock-free counters shared by both cache strategies.
#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    fetches: AtomicU64,
}

impl Counters {
    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
        }
    }
}
