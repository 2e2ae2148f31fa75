//! Local Cache Storage
//!
//! The in-process half of the system: an immutable value type, a byte-bounded
//! LRU engine, and the mutex-guarded wrapper each group reads and fills.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     LocalCache                            │
//! │   Mutex ─▶ LruCache<ByteView>                             │
//! │             ┌──────┐   ┌──────┐   ┌──────┐                │
//! │   head ───▶ │ MRU  │ ⇄ │ ...  │ ⇄ │ LRU  │ ◀─── tail      │
//! │             └──────┘   └──────┘   └──────┘                │
//! │   index: HashMap<String, slot>       on_evicted ─▶ stats  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Accounting
//!
//! Every entry costs `key.len() + value.len()` bytes. After any `add` the
//! total never exceeds the budget unless the budget is 0 (unbounded).

mod byteview;
mod local;
pub mod lru;
mod proptest;

pub use byteview::ByteView;
pub use local::{LocalCache, LocalCacheStats};
pub use lru::{ByteSize, LruCache};

/// Default per-group budget used by the demo binary (2KB)
pub const DEFAULT_CACHE_BYTES: u64 = 2 << 10;
