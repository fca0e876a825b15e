//! Single-flight cache with one slot per key.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use tracing::trace;

use super::{CacheStats, Counters, ReadThrough};

/// One key's entry: the published value and the lock its fill runs under.
struct Slot<V> {
    value: OnceLock<V>,
    fill: Mutex<()>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            value: OnceLock::new(),
            fill: Mutex::new(()),
        }
    }
}

/// A read-through cache that serializes misses per key instead of per table.
///
/// The table lock is held only long enough to find or create a key's slot.
/// The fetch then runs under that slot's own fill lock, so:
///
/// - concurrent misses on the same key wait for the first one and then read
///   its value, and `fetch` runs exactly once per key;
/// - misses on different keys run their fetches in parallel.
///
/// Reads of a filled slot never take the fill lock. A slot stays empty until
/// a fetch for it succeeds.
///
/// # Examples
///
/// ```
/// use readthrough::cache::{KeyedCache, ReadThrough};
///
/// let cache: KeyedCache<&str, usize> = KeyedCache::new();
/// assert_eq!(cache.get_with("hello", |k| k.len()), 5);
/// assert_eq!(cache.get(&"hello"), Some(5));
/// ```
pub struct KeyedCache<K, V> {
    slots: RwLock<HashMap<K, Arc<Slot<V>>>>,
    counters: Counters,
}

impl<K, V> KeyedCache<K, V> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            counters: Counters::default(),
        }
    }
}

impl<K, V> Default for KeyedCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> KeyedCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn slot(&self, key: &K) -> Arc<Slot<V>> {
        if let Some(slot) = self.lookup(key) {
            return slot;
        }

        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    fn lookup(&self, key: &K) -> Option<Arc<Slot<V>>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(Arc::clone)
    }
}

impl<K, V> fmt::Debug for KeyedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("KeyedCache")
            .field("slots", &slots)
            .field("stats", &self.counters.snapshot())
            .finish()
    }
}

impl<K, V> ReadThrough<K, V> for KeyedCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync,
    V: Clone + Send + Sync,
{
    fn try_get_with<F, E>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        let slot = self.slot(&key);
        if let Some(value) = slot.value.get() {
            self.counters.hit();
            return Ok(value.clone());
        }

        let _fill = slot.fill.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = slot.value.get() {
            trace!(?key, "filled while waiting");
            self.counters.hit();
            return Ok(value.clone());
        }

        trace!(?key, "cache miss");
        self.counters.fetch();
        let value = fetch(&key)?;
        // Only the holder of the fill lock publishes, so the cell is still empty.
        let _ = slot.value.set(value.clone());
        Ok(value)
    }

    fn get(&self, key: &K) -> Option<V> {
        self.lookup(key).and_then(|slot| slot.value.get().cloned())
    }

    fn len(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.value.get().is_some())
            .count()
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }
}
