//! Bounded LRU cache for embedding vectors.
//!
//! Keys are SHA-256 digests of the truncated text prefix, so memory per
//! entry is the vector plus 32 bytes regardless of prefix length.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};

type Key = [u8; 32];

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Entry {
    vector: Vec<f32>,
    tick: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<Key, Entry>,
    /// Last-use tick -> key; the first entry is the least recently used.
    recency: BTreeMap<u64, Key>,
    clock: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl Inner {
    fn touch(&mut self, key: Key) -> u64 {
        self.clock += 1;
        let tick = self.clock;
        self.recency.insert(tick, key);
        tick
    }
}

/// Thread-safe LRU cache of embeddings keyed by text.
///
/// # Examples
///
/// ```
/// use uema_rag::cache::EmbeddingCache;
///
/// let cache = EmbeddingCache::new(2);
/// cache.insert("a", vec![1.0]);
/// cache.insert("b", vec![2.0]);
/// cache.get("a");
/// cache.insert("c", vec![3.0]);
/// assert!(cache.get("b").is_none());
/// assert_eq!(cache.get("a"), Some(vec![1.0]));
/// ```
pub struct EmbeddingCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl EmbeddingCache {
    /// Create a cache holding at most `capacity` vectors (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn key(text: &str) -> Key {
        Sha256::digest(text.as_bytes()).into()
    }

    /// Look up a vector, marking it most recently used.
    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        let key = Self::key(text);
        let mut inner = self.inner.lock();

        let Some(old_tick) = inner.entries.get(&key).map(|e| e.tick) else {
            inner.misses += 1;
            return None;
        };

        inner.hits += 1;
        inner.recency.remove(&old_tick);
        let tick = inner.touch(key);
        let entry = inner.entries.get_mut(&key)?;
        entry.tick = tick;
        Some(entry.vector.clone())
    }

    /// Insert or refresh a vector, evicting the least recently used entry when full.
    pub fn insert(&self, text: &str, vector: Vec<f32>) {
        let key = Self::key(text);
        let mut inner = self.inner.lock();

        if let Some(old_tick) = inner.entries.get(&key).map(|e| e.tick) {
            inner.recency.remove(&old_tick);
        } else if inner.entries.len() >= self.capacity {
            if let Some((_, lru_key)) = inner.recency.pop_first() {
                inner.entries.remove(&lru_key);
                inner.evictions += 1;
            }
        }

        let tick = inner.touch(key);
        inner.entries.insert(key, Entry { vector, tick });
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.recency.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.entries.len(),
            capacity: self.capacity,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_hit() {
        let cache = EmbeddingCache::new(4);
        assert!(cache.get("x").is_none());
        cache.insert("x", vec![0.5, 0.5]);
        assert_eq!(cache.get("x"), Some(vec![0.5, 0.5]));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = EmbeddingCache::new(3);
        cache.insert("a", vec![1.0]);
        cache.insert("b", vec![2.0]);
        cache.insert("c", vec![3.0]);
        cache.get("a");
        cache.insert("d", vec![4.0]);

        assert_eq!(cache.len(), 3);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
        assert!(cache.get("d").is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn reinsert_refreshes_without_evicting() {
        let cache = EmbeddingCache::new(2);
        cache.insert("a", vec![1.0]);
        cache.insert("b", vec![2.0]);
        cache.insert("a", vec![9.0]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(cache.get("a"), Some(vec![9.0]));

        cache.insert("c", vec![3.0]);
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn clear_empties_cache() {
        let cache = EmbeddingCache::new(2);
        cache.insert("a", vec![1.0]);
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let cache = EmbeddingCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.insert("a", vec![1.0]);
        cache.insert("b", vec![2.0]);
        assert_eq!(cache.len(), 1);
    }
}
