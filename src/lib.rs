//! peercache - Distributed In-Memory Cache
//!
//! A read-through cache that spreads keys over a cluster of peers. Each key
//! has exactly one owner, chosen by a consistent hash ring; any node can be
//! asked for any key and will either answer from its local cache, fetch the
//! value from the owner over HTTP, or load it from the source of truth.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                              Group                               │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  get(key)                                                        │
//! │     │                                                            │
//! │     ├── hit ──▶ LocalCache (LRU, byte-bounded)                   │
//! │     │                                                            │
//! │     └── miss ─▶ FlightGroup (one load per key at a time)         │
//! │                    │                                             │
//! │                    ├── owner is remote ─▶ HttpPool ─▶ HttpGetter │
//! │                    │      (HashRing)          peer fetch         │
//! │                    │                                             │
//! │                    └── owner is self / peer failed ─▶ Getter     │
//! │                                          (populates LocalCache)  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`cache`] - LRU engine, byte views, and the concurrency-safe local cache
//! - [`error`] - Error types
//! - [`group`] - Cache groups, loaders and the group registry
//! - [`metrics`] - Prometheus exposition of group statistics
//! - [`peers`] - Consistent hash ring and the HTTP peer protocol
//! - [`server`] - HTTP accept loops and the front-end API
//! - [`singleflight`] - Duplicate call suppression
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use peercache::{GetterFunc, GroupRegistry, HttpPool};
//!
//! # async fn run() -> peercache::Result<()> {
//! let groups = Arc::new(GroupRegistry::new());
//! let scores = groups.new_group(
//!     "scores",
//!     2 << 10,
//!     GetterFunc::new(|key: &str| match key {
//!         "Tom" => Ok(b"630".to_vec()),
//!         _ => Err(format!("{} not exist", key)),
//!     }),
//! )?;
//!
//! let pool = Arc::new(HttpPool::new("http://localhost:8001", Arc::clone(&groups))?);
//! pool.set(["http://localhost:8001", "http://localhost:8002"]);
//! scores.register_peers(pool.clone())?;
//!
//! let value = scores.get("Tom").await?;
//! assert_eq!(value.as_string(), "630");
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod group;
pub mod metrics;
pub mod peers;
pub mod server;
pub mod singleflight;

// Re-export commonly used types
pub use cache::{ByteView, LruCache};
pub use error::{Error, Result};
pub use group::{CacheStats, Getter, GetterFunc, Group, GroupRegistry};
pub use metrics::MetricsExporter;
pub use peers::{HashRing, HttpGetter, HttpPool, PeerGetter, PeerPicker, PoolConfig};
pub use singleflight::FlightGroup;
