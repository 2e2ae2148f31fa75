//! HTTP Peer Pool
//!
//! Owns this node's view of the cluster: the hash ring, one client per remote
//! peer, and the request handler other nodes call.
//!
//! # Concurrency
//!
//! Ring and clients sit behind one `RwLock`. `set` swaps both in a single
//! write, so a concurrent `pick_peer` sees either the old or the new cluster,
//! never a mix.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use parking_lot::RwLock;
use reqwest::Client;
use tracing::{debug, info};

use super::client::HttpGetter;
use super::ring::HashRing;
use super::{PeerGetter, PeerPicker, DEFAULT_BASE_PATH, DEFAULT_REPLICAS};
use crate::error::{Error, Result};
use crate::group::GroupRegistry;
use crate::server::{octet_response, text_response};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for an HTTP peer pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// URL prefix for peer requests (must start and end with `/`)
    pub base_path: String,

    /// Virtual nodes per real peer
    pub replicas: usize,

    /// Deadline for a single peer fetch
    pub request_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            replicas: DEFAULT_REPLICAS,
            request_timeout: Duration::from_secs(5),
        }
    }
}

// =============================================================================
// Pool
// =============================================================================

struct PeerState {
    ring: HashRing,
    getters: HashMap<String, Arc<HttpGetter>>,
}

/// Peer picker and request handler for a pool of HTTP peers
pub struct HttpPool {
    /// This node's address, e.g. `http://localhost:8001`
    self_addr: String,
    config: PoolConfig,
    registry: Arc<GroupRegistry>,
    client: Client,
    state: RwLock<PeerState>,
}

impl HttpPool {
    /// Create a pool with default configuration
    pub fn new(self_addr: impl Into<String>, registry: Arc<GroupRegistry>) -> Result<Self> {
        Self::with_config(self_addr, registry, PoolConfig::default())
    }

    /// Create a pool with custom configuration
    pub fn with_config(
        self_addr: impl Into<String>,
        registry: Arc<GroupRegistry>,
        config: PoolConfig,
    ) -> Result<Self> {
        if !config.base_path.starts_with('/') || !config.base_path.ends_with('/') {
            return Err(Error::Config(format!(
                "base path must start and end with '/': {}",
                config.base_path
            )));
        }
        if config.replicas == 0 {
            return Err(Error::Config("replicas must be at least 1".to_string()));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            self_addr: self_addr.into(),
            state: RwLock::new(PeerState {
                ring: HashRing::new(config.replicas),
                getters: HashMap::new(),
            }),
            config,
            registry,
            client,
        })
    }

    /// Replace the peer set. Not additive: the ring and clients are rebuilt
    /// from `peers` alone.
    pub fn set<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let peers: Vec<String> = peers.into_iter().map(Into::into).collect();

        let mut ring = HashRing::new(self.config.replicas);
        ring.add(&peers);
        let getters = peers
            .iter()
            .map(|peer| {
                let getter =
                    HttpGetter::new(peer.clone(), &self.config.base_path, self.client.clone());
                (peer.clone(), Arc::new(getter))
            })
            .collect();

        *self.state.write() = PeerState { ring, getters };
        info!(self_addr = %self.self_addr, count = peers.len(), "Peer set updated");
    }

    /// Configured peers, sorted
    pub fn peers(&self) -> Vec<String> {
        let state = self.state.read();
        let mut peers: Vec<String> = state.getters.keys().cloned().collect();
        peers.sort();
        peers
    }

    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }

    pub fn base_path(&self) -> &str {
        &self.config.base_path
    }

    /// Serve one peer request: `GET {base_path}{group}/{key}`
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>> {
        let path = req.uri().path().to_string();
        debug!(server = %self.self_addr, method = %req.method(), path = %path, "Peer request");

        let Some(rest) = path.strip_prefix(self.config.base_path.as_str()) else {
            return text_response(
                StatusCode::NOT_FOUND,
                format!("unexpected path: {}", path),
            );
        };

        if req.method() != Method::GET {
            return text_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
        }

        let (group_name, key) = match split_group_key(rest) {
            Ok(parts) => parts,
            Err(reason) => return text_response(StatusCode::BAD_REQUEST, reason),
        };

        let Some(group) = self.registry.get(&group_name) else {
            return text_response(
                StatusCode::NOT_FOUND,
                format!("no such group: {}", group_name),
            );
        };
        group.record_server_request();

        match group.get(&key).await {
            Ok(view) => octet_response(view.bytes()),
            Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let state = self.state.read();
        match state.ring.get(key) {
            Some(peer) if peer != self.self_addr => {
                debug!(server = %self.self_addr, peer = %peer, "Pick peer");
                state
                    .getters
                    .get(peer)
                    .map(|getter| Arc::clone(getter) as Arc<dyn PeerGetter>)
            }
            _ => None,
        }
    }
}

impl std::fmt::Debug for HttpPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPool")
            .field("self_addr", &self.self_addr)
            .field("config", &self.config)
            .field("peers", &self.peers())
            .finish()
    }
}

/// Split `{group}/{key}` into two decoded, non-empty segments
fn split_group_key(rest: &str) -> std::result::Result<(String, String), String> {
    let mut parts = rest.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(group), Some(key), None) if !group.is_empty() && !key.is_empty() => {
            Ok((decode_segment(group)?, decode_segment(key)?))
        }
        _ => Err("bad request".to_string()),
    }
}

fn decode_segment(segment: &str) -> std::result::Result<String, String> {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .map_err(|e| format!("bad request: {}", e))
}

// =============================================================================
// Tests
// =============================================================================
