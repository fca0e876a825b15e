//! Whole-table cache with double-checked locking.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::trace;

use super::{CacheStats, Counters, ReadThrough};

/// A read-through cache guarded by a single reader/writer lock.
///
/// Warm keys are served under the shared lock, so any number of readers
/// proceed in parallel. A miss takes the exclusive lock, checks the key again
/// (another caller may have filled it while this one waited), and only then
/// runs `fetch`, still holding the exclusive lock. The fetch therefore runs at
/// most once per key, and every lookup of any key waits while it does.
///
/// # Examples
///
/// ```
/// use readthrough::cache::{Cache, ReadThrough};
///
/// let cache: Cache<u32, String> = Cache::new();
/// assert_eq!(cache.get_with(7, |k| format!("user-{k}")), "user-7");
///
/// // Warm: the second fetch is never called.
/// assert_eq!(cache.get_with(7, |_| unreachable!()), "user-7");
/// ```
pub struct Cache<K, V> {
    entries: RwLock<HashMap<K, V>>,
    counters: Counters,
}

impl<K, V> Cache<K, V> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    // A fetch that panics does so before its insert, so a poisoned table is
    // still consistent and keeps serving.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, V>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, V>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V> Default for Cache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("len", &self.read().len())
            .field("stats", &self.counters.snapshot())
            .finish()
    }
}

impl<K, V> ReadThrough<K, V> for Cache<K, V>
where
    K: Eq + Hash + fmt::Debug + Send + Sync,
    V: Clone + Send + Sync,
{
    fn try_get_with<F, E>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        let warm = self.read().get(&key).cloned();
        if let Some(value) = warm {
            self.counters.hit();
            return Ok(value);
        }

        let mut entries = self.write();
        if let Some(value) = entries.get(&key) {
            trace!(?key, "filled while waiting for the write lock");
            self.counters.hit();
            return Ok(value.clone());
        }

        trace!(?key, "cache miss");
        self.counters.fetch();
        let value = fetch(&key)?;
        entries.insert(key, value.clone());
        Ok(value)
    }

    fn get(&self, key: &K) -> Option<V> {
        self.read().get(key).cloned()
    }

    fn len(&self) -> usize {
        self.read().len()
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }
}
