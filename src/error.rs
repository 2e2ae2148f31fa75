//! Error types for peercache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving, loading or serving cache values.
///
/// The type is `Clone` so a single in-flight load can hand the exact same
/// outcome to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Caller supplied an unusable argument (e.g. an empty key)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No group registered under this name
    #[error("Group not found: {0}")]
    GroupNotFound(String),

    // =========================================================================
    // Peer Errors
    // =========================================================================
    /// Peer unreachable or the response could not be read
    #[error("Peer {peer} unreachable: {reason}")]
    Transport { peer: String, reason: String },

    /// Peer answered with a non-success status
    #[error("Peer {peer} returned status {status}")]
    PeerStatus { peer: String, status: u16 },

    // =========================================================================
    // Data Source Errors
    // =========================================================================
    /// The loader callback failed
    #[error("{0}")]
    Loader(String),

    /// Listener/connection error
    #[error("Server error: {0}")]
    Server(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a loader error from anything printable
    pub fn loader(reason: impl std::fmt::Display) -> Self {
        Error::Loader(reason.to_string())
    }

    /// True for failures that originate on the remote side of a peer fetch.
    /// These are recovered by falling back to the local loader.
    pub fn is_peer_failure(&self) -> bool {
        matches!(self, Error::Transport { .. } | Error::PeerStatus { .. })
    }
}
