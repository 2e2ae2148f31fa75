//! Consistent Hash Ring
//!
//! Maps keys onto a set of real nodes through `replicas` virtual positions per
//! node. A key belongs to the first virtual position clockwise from its hash,
//! wrapping around past the largest position.
//!
//! The hash is pluggable; the default is CRC-32 (IEEE) so every node in a
//! cluster computes the same placement.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Hash function mapping bytes onto the ring
pub type HashFn = Arc<dyn Fn(&[u8]) -> u32 + Send + Sync>;

/// Consistent hash ring with virtual nodes
#[derive(Clone)]
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    /// Sorted virtual positions
    keys: Vec<u32>,
    /// Virtual position → real node
    nodes: HashMap<u32, String>,
}

impl HashRing {
    /// Create an empty ring using CRC-32
    pub fn new(replicas: usize) -> Self {
        Self::with_hasher(replicas, Arc::new(crc32fast::hash))
    }

    /// Create an empty ring with a custom hash function
    pub fn with_hasher(replicas: usize, hash: HashFn) -> Self {
        Self {
            hash,
            replicas,
            keys: Vec::new(),
            nodes: HashMap::new(),
        }
    }

    /// Add real nodes, each taking `replicas` positions hashed from
    /// `"{i}{node}"`. Adding the same node twice duplicates its positions.
    pub fn add<I, S>(&mut self, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for node in nodes {
            let node = node.as_ref();
            for i in 0..self.replicas {
                let hash = (self.hash)(format!("{}{}", i, node).as_bytes());
                self.keys.push(hash);
                self.nodes.insert(hash, node.to_string());
            }
        }
        self.keys.sort_unstable();
    }

    /// Node owning `key`, or `None` when the ring is empty
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }

        let hash = (self.hash)(key.as_bytes());
        let idx = self.keys.partition_point(|&k| k < hash);
        let position = self.keys[idx % self.keys.len()];
        self.nodes.get(&position).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of virtual positions on the ring
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Distinct real nodes, sorted
    pub fn nodes(&self) -> Vec<&str> {
        self.nodes
            .values()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl fmt::Debug for HashRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashRing")
            .field("replicas", &self.replicas)
            .field("positions", &self.keys.len())
            .field("nodes", &self.nodes())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Interprets the input as a decimal number so placements are predictable
    fn numeric_hash() -> HashFn {
        Arc::new(|data: &[u8]| {
            std::str::from_utf8(data)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0)
        })
    }

    #[test]
    fn test_hashing() {
        let mut ring = HashRing::with_hasher(3, numeric_hash());

        // Positions: 2, 4, 6, 12, 14, 16, 22, 24, 26
        ring.add(["6", "4", "2"]);

        let cases = [("2", "2"), ("11", "2"), ("23", "4"), ("27", "2")];
        for (key, node) in cases {
            assert_eq!(ring.get(key), Some(node), "asking for {}", key);
        }

        // Adds 8, 18, 28
        ring.add(["8"]);

        let cases = [("2", "2"), ("11", "2"), ("23", "4"), ("27", "8")];
        for (key, node) in cases {
            assert_eq!(ring.get(key), Some(node), "asking for {}", key);
        }
    }

    #[test]
    fn test_empty_ring() {
        let ring = HashRing::new(50);
        assert!(ring.is_empty());
        assert_eq!(ring.get("anything"), None);
    }

    #[test]
    fn test_wraps_around() {
        let mut ring = HashRing::with_hasher(1, numeric_hash());
        ring.add(["10", "20"]);

        assert_eq!(ring.get("21"), Some("10"));
        assert_eq!(ring.get("20"), Some("20"));
        assert_eq!(ring.get("0"), Some("10"));
    }

    #[test]
    fn test_positions_sorted_and_mapped() {
        let mut ring = HashRing::new(3);
        ring.add(["A", "B", "C"]);

        assert_eq!(ring.len(), 9);
        assert!(ring.keys.windows(2).all(|w| w[0] <= w[1]));
        assert!(ring.keys.iter().all(|k| ring.nodes.contains_key(k)));
        assert_eq!(ring.nodes(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_lookup_is_deterministic() {
        let mut ring = HashRing::new(3);
        ring.add(["A", "B", "C"]);

        for i in 0..100 {
            let key = format!("key-{}", i);
            let first = ring.get(&key).map(str::to_string);
            assert!(first.is_some());
            for _ in 0..5 {
                assert_eq!(ring.get(&key).map(str::to_string), first);
            }
        }
    }

    #[test]
    fn test_rebuild_reproduces_assignment() {
        let mut first = HashRing::with_hasher(3, numeric_hash());
        first.add(["6", "4", "2"]);
        let mut second = HashRing::with_hasher(3, numeric_hash());
        second.add(["2", "6", "4"]);

        for i in 0..40 {
            let key = i.to_string();
            assert_eq!(first.get(&key), second.get(&key));
        }
    }

    #[test]
    fn test_virtual_nodes_spread_load() {
        let mut ring = HashRing::new(50);
        ring.add(["http://a:8001", "http://b:8002", "http://c:8003"]);

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for i in 0..3000 {
            let key = format!("object-{}", i);
            *counts.entry(ring.get(&key).unwrap()).or_default() += 1;
        }

        assert_eq!(counts.len(), 3);
        for (node, count) in counts {
            assert!(count > 300, "node {} only got {} keys", node, count);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Property: insertion order of the node set never changes placement.
        #[test]
        fn prop_placement_independent_of_insertion_order(
            mut nodes in prop::collection::hash_set("[a-z]{1,8}", 1..6)
                .prop_map(|s| s.into_iter().collect::<Vec<_>>()),
            keys in prop::collection::vec("[a-z0-9]{1,12}", 1..30),
        ) {
            let mut forward = HashRing::new(10);
            forward.add(&nodes);
            nodes.reverse();
            let mut backward = HashRing::new(10);
            backward.add(&nodes);

            for key in &keys {
                prop_assert_eq!(forward.get(key), backward.get(key));
            }
        }
    }
}
