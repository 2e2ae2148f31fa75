//! HTTP Peer Client
//!
//! Client half of the peer protocol: one `HttpGetter` per remote node, all
//! sharing the pool's `reqwest::Client` (and its connection pool and timeout).

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use super::PeerGetter;
use crate::error::{Error, Result};

/// Fetches values from one remote node
#[derive(Debug, Clone)]
pub struct HttpGetter {
    /// Remote node address, e.g. `http://10.0.0.2:8008`
    peer: String,
    /// `peer` + base path
    base_url: String,
    client: Client,
}

impl HttpGetter {
    pub fn new(peer: impl Into<String>, base_path: &str, client: Client) -> Self {
        let peer = peer.into();
        let base_url = format!("{}{}", peer, base_path);
        Self {
            peer,
            base_url,
            client,
        }
    }

    /// Request URL for a group/key pair
    pub fn url_for(&self, group: &str, key: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            urlencoding::encode(group),
            urlencoding::encode(key)
        )
    }
}

#[async_trait]
impl PeerGetter for HttpGetter {
    #[instrument(skip(self), fields(peer = %self.peer))]
    async fn get(&self, group: &str, key: &str) -> Result<Bytes> {
        let url = self.url_for(group, key);
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Transport {
                peer: self.peer.clone(),
                reason: e.to_string(),
            })?;

        if response.status() != StatusCode::OK {
            return Err(Error::PeerStatus {
                peer: self.peer.clone(),
                status: response.status().as_u16(),
            });
        }

        response.bytes().await.map_err(|e| Error::Transport {
            peer: self.peer.clone(),
            reason: format!("reading response body: {}", e),
        })
    }

    fn addr(&self) -> &str {
        &self.peer
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peers::DEFAULT_BASE_PATH;
    use assert_matches::assert_matches;

    #[test]
    fn test_url_for_encodes_segments() {
        let getter = HttpGetter::new("http://localhost:8001", DEFAULT_BASE_PATH, Client::new());

        assert_eq!(
            getter.url_for("scores", "Tom"),
            "http://localhost:8001/_geecache/scores/Tom"
        );
        assert_eq!(
            getter.url_for("my group", "a/b?c"),
            "http://localhost:8001/_geecache/my%20group/a%2Fb%3Fc"
        );
        assert_eq!(getter.addr(), "http://localhost:8001");
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_transport_error() {
        // Port 9 (discard) on loopback is closed on test machines
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(500))
            .build()
            .unwrap();
        let getter = HttpGetter::new("http://127.0.0.1:9", DEFAULT_BASE_PATH, client);

        let err = getter.get("scores", "Tom").await.unwrap_err();
        assert_matches!(err, Error::Transport { ref peer, .. } if peer == "http://127.0.0.1:9");
        assert!(err.is_peer_failure());
    }
}
