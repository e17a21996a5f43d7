//! Key-value cache used for metadata memoization.
//!
//! The [`Cache`] trait is the seam; [`MemoryCache`] is the in-process map
//! the registry uses unless told otherwise. Eviction and persistence are
//! left to implementations.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock};

/// A shared key-value store.
///
/// Methods take `&self` so one cache can back a registry that is itself
/// shared by reference.
///
/// # Example
///
/// ```
/// use rowmodel_core::cache::{Cache, MemoryCache};
///
/// let cache = MemoryCache::new();
/// assert!(!cache.has(&"users:table"));
///
/// cache.set("users:table", "users");
/// assert_eq!(cache.get(&"users:table"), Some("users"));
/// assert_eq!(cache.get_or(&"posts:table", "unknown"), "unknown");
///
/// cache.delete(&"users:table");
/// assert!(cache.get(&"users:table").is_none());
/// ```
pub trait Cache<K, V>: Send + Sync {
    /// Whether `key` has a stored value.
    fn has(&self, key: &K) -> bool;

    /// The stored value for `key`.
    fn get(&self, key: &K) -> Option<V>;

    /// The stored value for `key`, or `default` when absent.
    fn get_or(&self, key: &K, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: K, value: V);

    /// Remove `key`.
    fn delete(&self, key: &K);

    /// Remove everything.
    fn clear(&self);
}

/// A [`Cache`] backed by a `HashMap` behind a `RwLock`.
#[derive(Debug)]
pub struct MemoryCache<K, V> {
    data: RwLock<HashMap<K, V>>,
}

impl<K, V> MemoryCache<K, V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for MemoryCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash,
{
    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Cache<K, V> for MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn has(&self, key: &K) -> bool {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    fn get(&self, key: &K) -> Option<V> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: K, value: V) {
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    fn delete(&self, key: &K) {
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    fn clear(&self) {
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
