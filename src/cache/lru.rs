//! LRU Engine
//!
//! Byte-bounded least-recently-used store.
//!
//! # Design
//!
//! - Entries live in a dense `Vec` and are linked into a doubly-linked recency
//!   list through indices (front = most recently used)
//! - `index` maps each key to its slot; it never owns an entry
//! - Removal swaps the last slot into the hole and patches its neighbours, so
//!   storage stays dense with no tombstones
//! - Accounting: `used_bytes == Σ(key.len() + value.byte_size())`
//!
//! Not synchronized: wrap it in a lock to share it (see [`LocalCache`]).
//!
//! [`LocalCache`]: super::LocalCache

use std::collections::HashMap;
use std::fmt;

/// Values stored in the LRU report how many bytes they occupy
pub trait ByteSize {
    fn byte_size(&self) -> usize;
}

impl ByteSize for Vec<u8> {
    fn byte_size(&self) -> usize {
        self.len()
    }
}

impl ByteSize for String {
    fn byte_size(&self) -> usize {
        self.len()
    }
}

impl ByteSize for bytes::Bytes {
    fn byte_size(&self) -> usize {
        self.len()
    }
}

/// Callback fired with each entry removed by eviction or [`LruCache::remove`]
pub type EvictionCallback<V> = Box<dyn FnMut(&str, &V) + Send>;

struct Node<V> {
    key: String,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

#[inline]
fn entry_size<V: ByteSize>(key: &str, value: &V) -> u64 {
    (key.len() + value.byte_size()) as u64
}

/// Byte-bounded LRU cache
pub struct LruCache<V> {
    /// Maximum bytes (0 = unbounded)
    max_bytes: u64,
    /// Bytes currently accounted for
    used_bytes: u64,
    nodes: Vec<Node<V>>,
    /// Most recently used
    head: Option<usize>,
    /// Least recently used
    tail: Option<usize>,
    index: HashMap<String, usize>,
    on_evicted: Option<EvictionCallback<V>>,
}

impl<V: ByteSize> LruCache<V> {
    /// Create a cache bounded to `max_bytes` (0 = unbounded)
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            used_bytes: 0,
            nodes: Vec::new(),
            head: None,
            tail: None,
            index: HashMap::new(),
            on_evicted: None,
        }
    }

    /// Create a cache that reports removed entries to `on_evicted`
    pub fn with_eviction(max_bytes: u64, on_evicted: EvictionCallback<V>) -> Self {
        let mut cache = Self::new(max_bytes);
        cache.on_evicted = Some(on_evicted);
        cache
    }

    /// Look up a key, marking it most recently used
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.move_to_front(idx);
        Some(&self.nodes[idx].value)
    }

    /// Look up a key without touching recency
    pub fn peek(&self, key: &str) -> Option<&V> {
        self.index.get(key).map(|&idx| &self.nodes[idx].value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Insert or replace a value, then evict from the tail until the cache
    /// fits its budget again.
    ///
    /// An entry larger than the whole budget is inserted and immediately
    /// evicted.
    pub fn add(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();

        if let Some(&idx) = self.index.get(&key) {
            self.move_to_front(idx);
            let node = &mut self.nodes[idx];
            self.used_bytes =
                self.used_bytes - node.value.byte_size() as u64 + value.byte_size() as u64;
            node.value = value;
        } else {
            let size = entry_size(&key, &value);
            let idx = self.nodes.len();
            self.nodes.push(Node {
                key: key.clone(),
                value,
                prev: None,
                next: None,
            });
            self.index.insert(key, idx);
            self.push_front(idx);
            self.used_bytes += size;
        }

        while self.max_bytes != 0 && self.used_bytes > self.max_bytes {
            if self.remove_oldest().is_none() {
                break;
            }
        }
    }

    /// Evict the least recently used entry, firing the eviction callback
    pub fn remove_oldest(&mut self) -> Option<(String, V)> {
        let idx = self.tail?;
        Some(self.evict(idx))
    }

    /// Remove a specific key, firing the eviction callback
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let idx = *self.index.get(key)?;
        Some(self.evict(idx).1)
    }

    /// Drop every entry. The eviction callback is not fired.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
        self.used_bytes = 0;
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Bytes currently used (keys + values)
    pub fn bytes(&self) -> u64 {
        self.used_bytes
    }

    /// Configured budget (0 = unbounded)
    pub fn capacity(&self) -> u64 {
        self.max_bytes
    }

    /// Iterate from most to least recently used
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            cache: self,
            cursor: self.head,
        }
    }

    // -------------------------------------------------------------------------
    // List plumbing
    // -------------------------------------------------------------------------

    fn evict(&mut self, idx: usize) -> (String, V) {
        let node = self.take(idx);
        if let Some(callback) = self.on_evicted.as_mut() {
            callback(&node.key, &node.value);
        }
        (node.key, node.value)
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = None;
        self.nodes[idx].next = self.head;
        if let Some(h) = self.head {
            self.nodes[h].prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    /// Detach the node at `idx` from every structure and hand it back
    fn take(&mut self, idx: usize) -> Node<V> {
        self.unlink(idx);
        let node = self.nodes.swap_remove(idx);

        // The former last node now lives at `idx`; repoint its neighbours.
        if idx < self.nodes.len() {
            let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
            match prev {
                Some(p) => self.nodes[p].next = Some(idx),
                None => self.head = Some(idx),
            }
            match next {
                Some(n) => self.nodes[n].prev = Some(idx),
                None => self.tail = Some(idx),
            }
            if let Some(slot) = self.index.get_mut(&self.nodes[idx].key) {
                *slot = idx;
            }
        }

        self.index.remove(&node.key);
        self.used_bytes -= entry_size(&node.key, &node.value);
        node
    }
}

impl<V> fmt::Debug for LruCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("max_bytes", &self.max_bytes)
            .field("used_bytes", &self.used_bytes)
            .field("entries", &self.nodes.len())
            .finish()
    }
}

/// Recency-ordered iterator over `(key, value)`
pub struct Iter<'a, V> {
    cache: &'a LruCache<V>,
    cursor: Option<usize>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a str, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cursor?;
        let node = &self.cache.nodes[idx];
        self.cursor = node.next;
        Some((node.key.as_str(), &node.value))
    }
}

// =============================================================================
// Tests
// =============================================================================
