//! Peer Routing and the HTTP Peer Protocol
//!
//! Decides which node owns a key and fetches values from other nodes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            HttpPool                              │
//! │  ┌──────────────────────┐        ┌───────────────────────────┐   │
//! │  │ PeerPicker           │        │ Server role               │   │
//! │  │  HashRing ─▶ peer    │        │ GET {base}{group}/{key}   │   │
//! │  │  peer ─▶ HttpGetter  │        │  ─▶ GroupRegistry ─▶ get  │   │
//! │  └──────────────────────┘        └───────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Wire Format
//!
//! - `GET {base_path}{group}/{key}`, both segments percent-encoded
//! - 200 with `application/octet-stream` body = raw value bytes
//! - 400 malformed path, 404 unknown group, 500 load failure (text body)

mod client;
mod pool;
pub mod ring;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

pub use client::HttpGetter;
pub use pool::{HttpPool, PoolConfig};
pub use ring::{HashFn, HashRing};

/// Default URL prefix for peer requests
pub const DEFAULT_BASE_PATH: &str = "/_geecache/";

/// Default virtual nodes per real peer
pub const DEFAULT_REPLICAS: usize = 50;

/// Fetches a group's value for a key from one remote node
#[async_trait]
pub trait PeerGetter: Send + Sync {
    /// Fetch the raw value bytes
    async fn get(&self, group: &str, key: &str) -> Result<Bytes>;

    /// Address of the remote node (for logging)
    fn addr(&self) -> &str;
}

/// Chooses the node that owns a key
pub trait PeerPicker: Send + Sync {
    /// The remote peer owning `key`, or `None` when this node owns it
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}
