//! Lock-guarded keyed collections
//!
//! Registries in tessera (repository providers, in-memory stores) share the
//! same access pattern: many readers, occasional writers, values cloned out
//! so no guard outlives a call.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;

/// Keyed collection behind an interior lock
pub trait CollectionAccess<K, V> {
    /// Get a value by key (cloned)
    fn get(&self, key: &K) -> Option<V>;

    /// Insert a value, returning the one it replaced
    fn insert(&self, key: K, value: V) -> Option<V>;

    /// Remove a value by key
    fn remove(&self, key: &K) -> Option<V>;

    /// Check if key exists
    fn contains(&self, key: &K) -> bool;

    /// Number of entries
    fn len(&self) -> usize;

    /// Check if empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys (cloned, unordered)
    fn keys(&self) -> Vec<K>;

    /// All values (cloned, unordered)
    fn values(&self) -> Vec<V>;

    /// Remove every entry
    fn clear(&self);
}

/// `HashMap` guarded by a `parking_lot::RwLock`
#[derive(Debug)]
pub struct SyncMap<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> SyncMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Run `f` against the map under the read lock
    pub fn read_with<R>(&self, f: impl FnOnce(&HashMap<K, V>) -> R) -> R {
        f(&self.inner.read())
    }

    /// Run `f` against the map under the write lock
    pub fn write_with<R>(&self, f: impl FnOnce(&mut HashMap<K, V>) -> R) -> R {
        f(&mut self.inner.write())
    }

    /// Clone the whole map
    pub fn snapshot(&self) -> HashMap<K, V> {
        self.inner.read().clone()
    }

    /// Replace the whole map
    pub fn restore(&self, contents: HashMap<K, V>) {
        *self.inner.write() = contents;
    }
}

impl<K, V> Default for SyncMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> CollectionAccess<K, V> for SyncMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn get(&self, key: &K) -> Option<V> {
        self.inner.read().get(key).cloned()
    }

    fn insert(&self, key: K, value: V) -> Option<V> {
        self.inner.write().insert(key, value)
    }

    fn remove(&self, key: &K) -> Option<V> {
        self.inner.write().remove(key)
    }

    fn contains(&self, key: &K) -> bool {
        self.inner.read().contains_key(key)
    }

    fn len(&self) -> usize {
        self.inner.read().len()
    }

    fn keys(&self) -> Vec<K> {
        self.inner.read().keys().cloned().collect()
    }

    fn values(&self) -> Vec<V> {
        self.inner.read().values().cloned().collect()
    }

    fn clear(&self) {
        self.inner.write().clear();
    }
}
