//! Bounded least-recently-used cache.
//!
//! A thin wrapper over [`lru::LruCache`] that reports evictions from [`LruCache::insert`] and
//! never counts a refreshed key as one.
//!
//! ```text
//! insert(u1) insert(u2) insert(u3)      capacity = 2
//! ┌──────────────────────────────┐
//! │ order: [u2, u3]   evicted: u1│
//! └──────────────────────────────┘
//! get(u2) insert(u4)
//! ┌──────────────────────────────┐
//! │ order: [u2, u4]   evicted: u3│
//! └──────────────────────────────┘
//! ```

use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;

/// Bounded map evicting the least-recently-touched entry.
pub struct LruCache<K, V> {
    inner: lru::LruCache<K, V>,
}

impl<K: Hash + Eq, V> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash,
{
    /// Create a cache holding at most `capacity` entries (a zero capacity is treated as 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: lru::LruCache::new(capacity),
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.inner.cap().get()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Whether `key` is cached. Does not touch recency.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.contains(key)
    }

    /// Insert or replace `key`, marking it most recent.
    ///
    /// Returns the entry evicted to make room, if any. Replacing an existing key never evicts.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.inner.contains(&key) {
            self.inner.put(key, value);
            return None;
        }
        let evicted = self.inner.push(key, value);
        if evicted.is_some() {
            tracing::trace!(capacity = self.capacity(), "evicted least recently used entry");
        }
        evicted
    }

    /// Look up `key`, marking it most recent.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    /// Look up `key` without touching recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.inner.peek(key)
    }

    /// Mutable lookup without touching recency.
    pub fn peek_mut(&mut self, key: &K) -> Option<&mut V> {
        self.inner.peek_mut(key)
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.inner.pop(key)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Keys from least to most recently touched.
    pub fn keys_lru_order(&self) -> impl Iterator<Item = &K> {
        self.inner.iter().rev().map(|(key, _)| key)
    }
}
