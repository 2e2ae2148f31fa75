//! Local Cache - mutex-guarded LRU of byte views
//!
//! The per-group hot store. Every access goes through one short critical
//! section; the lock is never held across a loader or peer call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use super::byteview::ByteView;
use super::lru::LruCache;

/// Thread-safe LRU of [`ByteView`]s
pub struct LocalCache {
    lru: Mutex<LruCache<ByteView>>,
    /// Hit count
    hits: AtomicU64,
    /// Miss count
    misses: AtomicU64,
    /// Capacity evictions (shared with the LRU's eviction callback)
    evictions: Arc<AtomicU64>,
}

impl LocalCache {
    /// Create a cache holding at most `cache_bytes` (0 = unbounded)
    pub fn new(cache_bytes: u64) -> Self {
        let evictions = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&evictions);
        let lru = LruCache::with_eviction(
            cache_bytes,
            Box::new(move |_key: &str, _value: &ByteView| {
                counter.fetch_add(1, Ordering::Relaxed);
            }),
        );

        Self {
            lru: Mutex::new(lru),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions,
        }
    }

    /// Get an entry, marking it most recently used
    pub fn get(&self, key: &str) -> Option<ByteView> {
        let value = self.lru.lock().get(key).cloned();
        match value {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        value
    }

    /// Insert or replace an entry
    pub fn add(&self, key: &str, value: ByteView) {
        self.lru.lock().add(key, value);
    }

    pub fn len(&self) -> usize {
        self.lru.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lru.lock().is_empty()
    }

    /// Bytes in use (keys + values)
    pub fn bytes(&self) -> u64 {
        self.lru.lock().bytes()
    }

    /// Snapshot of cache statistics
    pub fn stats(&self) -> LocalCacheStats {
        let (bytes, items, capacity) = {
            let lru = self.lru.lock();
            (lru.bytes(), lru.len() as u64, lru.capacity())
        };
        LocalCacheStats {
            bytes,
            items,
            capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for LocalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCache")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Local cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocalCacheStats {
    /// Bytes in use
    pub bytes: u64,
    /// Number of entries
    pub items: u64,
    /// Configured budget (0 = unbounded)
    pub capacity: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

// =============================================================================
// Tests
// =============================================================================
