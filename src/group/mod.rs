//! Cache Groups
//!
//! A [`Group`] is a named cache namespace. It binds a loader for misses, a
//! local LRU of byte views, optional peer routing, and a single-flight
//! coordinator so each missing key is resolved once no matter how many
//! callers ask for it at the same time.
//!
//! # Lookup Flow
//!
//! ```text
//! get(key) ──▶ local cache ── hit ──────────────────────────────▶ value
//!                  │ miss
//!                  ▼
//!          single-flight(key) ──▶ pick_peer(key)
//!                                   │ remote            │ self / none
//!                                   ▼                   ▼
//!                             peer fetch ── fail ──▶ loader ──▶ populate cache
//!                                   │ ok                 │
//!                                   ▼                    ▼
//!                                 value                value
//! ```
//!
//! Peer-fetched values are returned but never stored locally; only the owner
//! of a key caches it.

mod registry;
mod stats;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use once_cell::sync::OnceCell;
use tracing::{debug, instrument, warn};

use crate::cache::{ByteView, LocalCache};
use crate::error::{Error, Result};
use crate::peers::{PeerGetter, PeerPicker};
use crate::singleflight::FlightGroup;

pub use registry::GroupRegistry;
pub use stats::{CacheStats, GroupStats};

// =============================================================================
// Loader
// =============================================================================

/// Loads the source value for a key on a cache miss
#[async_trait]
pub trait Getter: Send + Sync {
    async fn get(&self, key: &str) -> Result<Bytes>;
}

/// Adapts a plain function into a [`Getter`]
///
/// Any error type that implements `Display` becomes [`Error::Loader`].
///
/// The closure runs inline on the calling task. A loader that blocks (disk,
/// a synchronous database driver) holds a runtime worker for the whole call
/// and should implement [`Getter`] itself, moving the work onto
/// `tokio::task::spawn_blocking`.
///
/// ```
/// use peercache::GetterFunc;
///
/// let getter = GetterFunc::new(|key: &str| Ok::<_, String>(format!("{}-value", key)));
/// ```
pub struct GetterFunc<F>(F);

impl<F> GetterFunc<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, V, E> Getter for GetterFunc<F>
where
    F: Fn(&str) -> std::result::Result<V, E> + Send + Sync,
    V: Into<Bytes> + 'static,
    E: std::fmt::Display + 'static,
{
    async fn get(&self, key: &str) -> Result<Bytes> {
        (self.0)(key).map(Into::into).map_err(Error::loader)
    }
}

// =============================================================================
// Group
// =============================================================================

/// A named cache namespace
pub struct Group {
    name: String,
    getter: Arc<dyn Getter>,
    main_cache: LocalCache,
    peers: OnceCell<Arc<dyn PeerPicker>>,
    loader: FlightGroup<ByteView>,
    stats: GroupStats,
}

impl Group {
    pub(crate) fn new(name: String, cache_bytes: u64, getter: Arc<dyn Getter>) -> Self {
        Self {
            name,
            getter,
            main_cache: LocalCache::new(cache_bytes),
            peers: OnceCell::new(),
            loader: FlightGroup::new(),
            stats: GroupStats::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bind the peer picker. Allowed once per group.
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) -> Result<()> {
        self.peers.set(peers).map_err(|_| {
            Error::Config(format!(
                "register_peers called more than once for group {}",
                self.name
            ))
        })
    }

    /// Get the value for `key`, loading it on a miss
    #[instrument(skip(self), fields(group = %self.name))]
    pub async fn get(&self, key: &str) -> Result<ByteView> {
        self.stats.record_get();
        if key.is_empty() {
            return Err(Error::InvalidArgument("key is required".to_string()));
        }

        if let Some(value) = self.main_cache.get(key) {
            debug!("Cache hit");
            self.stats.record_cache_hit();
            return Ok(value);
        }

        self.load(key).await
    }

    /// Point-in-time statistics
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(&self.name, self.main_cache.stats())
    }

    /// Count a request served to another node
    pub fn record_server_request(&self) {
        self.stats.record_server_request();
    }

    async fn load(&self, key: &str) -> Result<ByteView> {
        self.stats.record_load();

        let (result, shared) = self
            .loader
            .run_shared(key, || async {
                if let Some(peer) = self.peers.get().and_then(|p| p.pick_peer(key)) {
                    match self.get_from_peer(peer.as_ref(), key).await {
                        Ok(value) => {
                            self.stats.record_peer_load();
                            return Ok(value);
                        }
                        Err(e) => {
                            self.stats.record_peer_error();
                            warn!(
                                peer = %peer.addr(),
                                error = %e,
                                "Failed to get from peer, loading locally"
                            );
                        }
                    }
                }
                self.get_locally(key).await
            })
            .await;

        if shared {
            self.stats.record_load_deduped();
        }
        result
    }

    async fn get_from_peer(&self, peer: &dyn PeerGetter, key: &str) -> Result<ByteView> {
        let bytes = peer.get(&self.name, key).await?;
        Ok(ByteView::new(bytes))
    }

    async fn get_locally(&self, key: &str) -> Result<ByteView> {
        debug!("Loading from source");
        let bytes = match self.getter.get(key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.stats.record_local_load_err();
                return Err(e);
            }
        };
        self.stats.record_local_load();

        let value = ByteView::new(bytes);
        self.populate_cache(key, value.clone());
        Ok(value)
    }

    fn populate_cache(&self, key: &str, value: ByteView) {
        self.main_cache.add(key, value);
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("peers_registered", &self.peers.get().is_some())
            .field("cache", &self.main_cache)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
