//! Live account registry
//!
//! The only mutable state shared between request threads and job threads:
//! the mapping of account identifier to connected client. Mutations are
//! expected to run inside routines submitted to the
//! [`AsyncBridge`](crate::bridge::AsyncBridge); readers take point-in-time
//! snapshots, never live views, so an account added or removed after a
//! job's snapshot is neither picked up nor dropped mid-run.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::protocol::ProtocolClient;

/// Thread-safe identifier -> client mapping.
///
/// Backed by a `BTreeMap` so snapshots come out in a deterministic
/// identifier order, which is the order jobs walk accounts in.
#[derive(Clone, Default)]
pub struct AccountRegistry {
    inner: Arc<RwLock<BTreeMap<String, Arc<dyn ProtocolClient>>>>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the registered identifiers
    pub fn identifiers(&self) -> Vec<String> {
        self.inner.read().unwrap().keys().cloned().collect()
    }

    pub fn get(&self, identifier: &str) -> Option<Arc<dyn ProtocolClient>> {
        self.inner.read().unwrap().get(identifier).cloned()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.inner.read().unwrap().contains_key(identifier)
    }

    pub fn insert(&self, identifier: String, client: Arc<dyn ProtocolClient>) {
        self.inner.write().unwrap().insert(identifier, client);
    }

    /// Remove an entry, returning the client so it can be disconnected.
    pub fn remove(&self, identifier: &str) -> Option<Arc<dyn ProtocolClient>> {
        self.inner.write().unwrap().remove(identifier)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    /// Point-in-time copy of all entries, in identifier order
    pub fn snapshot(&self) -> Vec<(String, Arc<dyn ProtocolClient>)> {
        self.inner
            .read()
            .unwrap()
            .iter()
            .map(|(id, client)| (id.clone(), client.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::mock::MockClient;

    fn client() -> Arc<dyn ProtocolClient> {
        Arc::new(MockClient::authorized())
    }

    #[test]
    fn test_insert_get_remove() {
        let registry = AccountRegistry::new();
        assert!(registry.is_empty());

        registry.insert("15551234".to_string(), client());
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("15551234"));
        assert!(registry.get("15551234").is_some());

        assert!(registry.remove("15551234").is_some());
        assert!(registry.is_empty());
        assert!(registry.remove("15551234").is_none());
    }

    #[test]
    fn test_identifiers_are_sorted() {
        let registry = AccountRegistry::new();
        registry.insert("30".to_string(), client());
        registry.insert("10".to_string(), client());
        registry.insert("20".to_string(), client());
        assert_eq!(registry.identifiers(), vec!["10", "20", "30"]);
    }

    #[test]
    fn test_snapshot_is_point_in_time() {
        let registry = AccountRegistry::new();
        registry.insert("1".to_string(), client());
        let snapshot = registry.snapshot();

        registry.insert("2".to_string(), client());
        registry.remove("1");

        // The snapshot still holds exactly the entry taken at copy time.
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, "1");
    }

    #[test]
    fn test_clones_share_state() {
        let registry = AccountRegistry::new();
        let view = registry.clone();
        registry.insert("7".to_string(), client());
        assert!(view.contains("7"));
    }
}
