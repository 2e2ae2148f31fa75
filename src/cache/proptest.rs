//! Property-Based Tests for the LRU Engine
//!
//! # Test Properties
//!
//! 1. **Accounting**: `bytes()` always equals Σ(key + value) over live entries
//! 2. **Budget**: `bytes() <= capacity()` after every add when bounded
//! 3. **Index/List agreement**: every key reachable through the recency list
//!    is also found by lookup, and the counts match
//! 4. **Eviction callback**: every entry that disappears without an explicit
//!    clear is reported exactly once

#![cfg(test)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use super::lru::LruCache;

// =============================================================================
// Strategies
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Add(String, Vec<u8>),
    Get(String),
    Remove(String),
    RemoveOldest,
}

/// Small key space so adds, replaces and hits collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-f]{1,3}"
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (key_strategy(), prop::collection::vec(any::<u8>(), 0..40))
            .prop_map(|(k, v)| Op::Add(k, v)),
        3 => key_strategy().prop_map(Op::Get),
        1 => key_strategy().prop_map(Op::Remove),
        1 => Just(Op::RemoveOldest),
    ]
}

fn check_invariants(lru: &LruCache<Vec<u8>>) -> Result<(), TestCaseError> {
    let mut seen = HashSet::new();
    let mut total = 0u64;
    for (key, value) in lru.iter() {
        prop_assert!(seen.insert(key.to_string()), "duplicate key {} in list", key);
        prop_assert!(lru.contains(key), "list key {} missing from index", key);
        total += (key.len() + value.len()) as u64;
    }
    prop_assert_eq!(seen.len(), lru.len());
    prop_assert_eq!(total, lru.bytes());
    if lru.capacity() > 0 {
        prop_assert!(lru.bytes() <= lru.capacity());
    }
    Ok(())
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: accounting and index/list agreement hold after every operation.
    #[test]
    fn prop_accounting_holds_after_every_op(
        capacity in prop_oneof![Just(0u64), 1u64..200],
        ops in prop::collection::vec(op_strategy(), 1..120),
    ) {
        let mut lru = LruCache::new(capacity);

        for op in ops {
            match op {
                Op::Add(k, v) => lru.add(k, v),
                Op::Get(k) => { lru.get(&k); }
                Op::Remove(k) => { lru.remove(&k); }
                Op::RemoveOldest => { lru.remove_oldest(); }
            }
            check_invariants(&lru)?;
        }
    }

    /// Property: live entries plus reported evictions account for every
    /// distinct key ever added (nothing vanishes silently).
    #[test]
    fn prop_evictions_are_reported(
        capacity in 1u64..120,
        entries in prop::collection::vec(
            (key_strategy(), prop::collection::vec(any::<u8>(), 0..30)),
            1..80,
        ),
    ) {
        let evicted = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = Arc::clone(&evicted);
        let mut lru = LruCache::with_eviction(
            capacity,
            Box::new(move |key: &str, _: &Vec<u8>| sink.lock().unwrap().push(key.to_string())),
        );

        let mut added = HashSet::new();
        for (k, v) in entries {
            added.insert(k.clone());
            lru.add(k, v);
        }

        let live: HashSet<String> = lru.iter().map(|(k, _)| k.to_string()).collect();
        let gone: HashSet<String> = evicted.lock().unwrap().iter().cloned().collect();
        let accounted: HashSet<String> = live.union(&gone).cloned().collect();
        prop_assert_eq!(accounted, added);
    }

    /// Property: the most recently added key that fits is always retained.
    #[test]
    fn prop_last_fitting_add_is_retained(
        capacity in 10u64..200,
        entries in prop::collection::vec(
            (key_strategy(), prop::collection::vec(any::<u8>(), 0..6)),
            1..50,
        ),
    ) {
        let mut lru = LruCache::new(capacity);
        let mut last = None;
        for (k, v) in entries {
            last = Some((k.clone(), v.clone()));
            lru.add(k, v);
        }

        if let Some((k, v)) = last {
            prop_assert_eq!(lru.iter().next().map(|(key, _)| key.to_string()), Some(k.clone()));
            prop_assert_eq!(lru.peek(&k), Some(&v));
        }
    }
}
