//! Group Statistics
//!
//! Lock-free counters updated on the lookup path.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::cache::LocalCacheStats;

/// Per-group counters
#[derive(Debug, Default)]
pub struct GroupStats {
    gets: AtomicU64,
    cache_hits: AtomicU64,
    peer_loads: AtomicU64,
    peer_errors: AtomicU64,
    loads: AtomicU64,
    loads_deduped: AtomicU64,
    local_loads: AtomicU64,
    local_load_errs: AtomicU64,
    server_requests: AtomicU64,
}

impl GroupStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_load(&self) {
        self.peer_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_error(&self) {
        self.peer_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_deduped(&self) {
        self.loads_deduped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_load(&self) {
        self.local_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_load_err(&self) {
        self.local_load_errs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_server_request(&self) {
        self.server_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Combine the counters with the local cache's view into one snapshot
    pub fn snapshot(&self, group: &str, cache: LocalCacheStats) -> CacheStats {
        CacheStats {
            group: group.to_string(),
            gets: self.gets.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            peer_loads: self.peer_loads.load(Ordering::Relaxed),
            peer_errors: self.peer_errors.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            loads_deduped: self.loads_deduped.load(Ordering::Relaxed),
            local_loads: self.local_loads.load(Ordering::Relaxed),
            local_load_errs: self.local_load_errs.load(Ordering::Relaxed),
            server_requests: self.server_requests.load(Ordering::Relaxed),
            cache,
        }
    }
}

/// Point-in-time statistics for one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Group name
    pub group: String,
    /// Lookups received (including invalid ones)
    pub gets: u64,
    /// Lookups answered from the local cache
    pub cache_hits: u64,
    /// Values fetched from a remote peer
    pub peer_loads: u64,
    /// Failed peer fetches (each fell back to the loader)
    pub peer_errors: u64,
    /// Misses dispatched to the single-flight coordinator
    pub loads: u64,
    /// Misses that joined another caller's in-flight load
    pub loads_deduped: u64,
    /// Successful loader calls
    pub local_loads: u64,
    /// Failed loader calls
    pub local_load_errs: u64,
    /// Requests served to other peers
    pub server_requests: u64,
    /// Local cache view
    pub cache: LocalCacheStats,
}

impl CacheStats {
    /// Fraction of lookups answered locally (0.0 - 1.0)
    pub fn hit_ratio(&self) -> f64 {
        if self.gets == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.gets as f64
        }
    }
}
