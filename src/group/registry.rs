//! Group Registry
//!
//! Explicit, shareable replacement for a process-global map of groups.
//! Construct one at startup, wrap it in an `Arc`, and hand it to every
//! component that needs lookup by name (the peer server in particular).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::{Getter, Group};
use crate::error::{Error, Result};

/// Name → group map. Registration takes the write lock; lookups share the
/// read lock.
#[derive(Default)]
pub struct GroupRegistry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a group.
    ///
    /// `cache_bytes` bounds the group's local cache (0 = unbounded). Fails
    /// with [`Error::Config`] if the name is empty or already taken.
    pub fn new_group<G>(
        &self,
        name: impl Into<String>,
        cache_bytes: u64,
        getter: G,
    ) -> Result<Arc<Group>>
    where
        G: Getter + 'static,
    {
        self.new_group_shared(name, cache_bytes, Arc::new(getter))
    }

    /// Like [`new_group`](Self::new_group) for a loader that is already shared
    pub fn new_group_shared(
        &self,
        name: impl Into<String>,
        cache_bytes: u64,
        getter: Arc<dyn Getter>,
    ) -> Result<Arc<Group>> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Config("group name is required".to_string()));
        }

        let mut groups = self.groups.write();
        if groups.contains_key(&name) {
            return Err(Error::Config(format!("group {} already registered", name)));
        }

        let group = Arc::new(Group::new(name.clone(), cache_bytes, getter));
        groups.insert(name.clone(), Arc::clone(&group));
        info!(group = %name, cache_bytes, "Group registered");
        Ok(group)
    }

    /// Look up a group by name
    pub fn get(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    /// Look up a group, failing with [`Error::GroupNotFound`]
    pub fn require(&self, name: &str) -> Result<Arc<Group>> {
        self.get(name)
            .ok_or_else(|| Error::GroupNotFound(name.to_string()))
    }

    /// Registered group names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// All registered groups, sorted by name
    pub fn groups(&self) -> Vec<Arc<Group>> {
        let mut groups: Vec<Arc<Group>> = self.groups.read().values().cloned().collect();
        groups.sort_by(|a, b| a.name().cmp(b.name()));
        groups
    }

    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }
}

impl std::fmt::Debug for GroupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupRegistry")
            .field("groups", &self.names())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::GetterFunc;
    use assert_matches::assert_matches;

    fn echo() -> GetterFunc<impl Fn(&str) -> std::result::Result<String, String> + Send + Sync> {
        GetterFunc::new(|key: &str| Ok(key.to_string()))
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = GroupRegistry::new();
        let group = registry.new_group("scores", 2 << 10, echo()).unwrap();

        assert_eq!(group.name(), "scores");
        let found = registry.get("scores").unwrap();
        assert!(Arc::ptr_eq(&group, &found));
        assert!(registry.get("unknown").is_none());
        assert_matches!(registry.require("unknown"), Err(Error::GroupNotFound(_)));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = GroupRegistry::new();
        registry.new_group("scores", 0, echo()).unwrap();

        assert_matches!(
            registry.new_group("scores", 0, echo()),
            Err(Error::Config(_))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_empty_name_rejected() {
        let registry = GroupRegistry::new();
        assert_matches!(registry.new_group("", 0, echo()), Err(Error::Config(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_names_sorted() {
        let registry = GroupRegistry::new();
        for name in ["users", "scores", "avatars"] {
            registry.new_group(name, 0, echo()).unwrap();
        }

        assert_eq!(registry.names(), vec!["avatars", "scores", "users"]);
        let groups: Vec<String> = registry
            .groups()
            .iter()
            .map(|g| g.name().to_string())
            .collect();
        assert_eq!(groups, registry.names());
    }

    #[test]
    fn test_concurrent_lookups() {
        let registry = Arc::new(GroupRegistry::new());
        registry.new_group("scores", 0, echo()).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        assert!(registry.get("scores").is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
