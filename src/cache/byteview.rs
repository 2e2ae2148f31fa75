//! Immutable Byte Views
//!
//! The value type stored in every group cache. Backed by [`bytes::Bytes`], so
//! clones share the same allocation and nothing can mutate it once built.

use std::fmt;

use bytes::Bytes;

use super::lru::ByteSize;

/// An immutable view of a cached value
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteView {
    b: Bytes,
}

impl ByteView {
    /// Wrap an existing buffer without copying
    pub fn new(b: Bytes) -> Self {
        Self { b }
    }

    /// Number of bytes in the view
    #[inline]
    pub fn len(&self) -> usize {
        self.b.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.b.is_empty()
    }

    /// Copy the data out into an owned buffer the caller may modify freely
    pub fn byte_slice(&self) -> Vec<u8> {
        self.b.to_vec()
    }

    /// Cheap, shared handle to the underlying bytes (zero-copy)
    pub fn bytes(&self) -> Bytes {
        self.b.clone()
    }

    /// String view of the data (lossy for non-UTF-8 payloads)
    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.b).into_owned()
    }
}

impl ByteSize for ByteView {
    fn byte_size(&self) -> usize {
        self.len()
    }
}

impl AsRef<[u8]> for ByteView {
    fn as_ref(&self) -> &[u8] {
        &self.b
    }
}

impl From<Bytes> for ByteView {
    fn from(b: Bytes) -> Self {
        Self::new(b)
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(v: Vec<u8>) -> Self {
        Self::new(Bytes::from(v))
    }
}

impl From<&[u8]> for ByteView {
    fn from(v: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(v))
    }
}

impl From<String> for ByteView {
    fn from(s: String) -> Self {
        Self::new(Bytes::from(s))
    }
}

impl From<&str> for ByteView {
    fn from(s: &str) -> Self {
        Self::new(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl fmt::Display for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.b))
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteView").field("len", &self.len()).finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
