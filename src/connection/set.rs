//! Verified targets the console is connected to.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::ConsoleError;
use crate::models::ClusterTarget;
use crate::store::KeyValueStore;

/// Namespace holding the connection list.
pub const CONNECTION_NAMESPACE: &str = "clusterdeck.connections";

/// Persisted, ordered set of verified targets keyed by id.
pub struct ConnectionSet {
    store: Arc<dyn KeyValueStore>,
    targets: Vec<ClusterTarget>,
}

impl ConnectionSet {
    pub fn open(store: Arc<dyn KeyValueStore>) -> Result<Self, ConsoleError> {
        let targets = match store.get(CONNECTION_NAMESPACE)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                ConsoleError::PersistenceFormat(format!("stored connections: {}", e))
            })?,
            None => Vec::new(),
        };
        Ok(Self { store, targets })
    }

    pub fn list(&self) -> &[ClusterTarget] {
        &self.targets
    }

    pub fn get(&self, id: &str) -> Option<&ClusterTarget> {
        self.targets.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Appends a verified target. Ids must be unique.
    pub fn add(&mut self, target: ClusterTarget) -> Result<(), ConsoleError> {
        if !target.verified {
            return Err(ConsoleError::validation(format!(
                "{} has not been verified",
                target.address
            )));
        }
        if self.get(&target.id).is_some() {
            return Err(ConsoleError::validation(format!(
                "connection {} already exists",
                target.id
            )));
        }
        let mut next = self.targets.clone();
        info!(id = %target.id, name = %target.display_name, "connection added");
        next.push(target);
        self.commit(next)
    }

    pub fn remove(&mut self, id: &str) -> Result<bool, ConsoleError> {
        let next: Vec<ClusterTarget> = self.targets.iter().filter(|t| t.id != id).cloned().collect();
        if next.len() == self.targets.len() {
            return Ok(false);
        }
        self.commit(next)?;
        debug!(id, "connection removed");
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<(), ConsoleError> {
        self.store.delete(CONNECTION_NAMESPACE)?;
        self.targets.clear();
        Ok(())
    }

    fn commit(&mut self, next: Vec<ClusterTarget>) -> Result<(), ConsoleError> {
        let raw = serde_json::to_string_pretty(&next)
            .map_err(|e| ConsoleError::PersistenceFormat(e.to_string()))?;
        self.store.put(CONNECTION_NAMESPACE, &raw)?;
        self.targets = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApiVersion, Credentials, TargetKind};
    use crate::store::MemoryStore;

    fn target(id: &str) -> ClusterTarget {
        ClusterTarget {
            id: id.into(),
            display_name: format!("cluster-{}", id),
            address: "10.0.0.1".into(),
            credentials: Credentials::new("u", "p"),
            kind: TargetKind::Element,
            api_version: ApiVersion::V2,
            verified: true,
        }
    }

    #[test]
    fn test_add_persists_and_rejects_duplicates() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut set = ConnectionSet::open(store.clone()).unwrap();
        set.add(target("a")).unwrap();
        assert!(matches!(set.add(target("a")), Err(ConsoleError::Validation(_))));
        assert_eq!(set.len(), 1);

        let reopened = ConnectionSet::open(store).unwrap();
        assert_eq!(reopened.list(), set.list());
    }

    #[test]
    fn test_unverified_rejected() {
        let mut set = ConnectionSet::open(Arc::new(MemoryStore::new())).unwrap();
        let mut t = target("a");
        t.verified = false;
        assert!(set.add(t).is_err());
        assert!(set.is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut set = ConnectionSet::open(store.clone()).unwrap();
        set.add(target("a")).unwrap();
        set.add(target("b")).unwrap();
        assert!(set.remove("a").unwrap());
        assert!(!set.remove("a").unwrap());
        assert_eq!(set.get("b").map(|t| t.display_name.as_str()), Some("cluster-b"));

        set.clear().unwrap();
        assert!(set.is_empty());
        assert!(ConnectionSet::open(store).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_store() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.put(CONNECTION_NAMESPACE, "[{").unwrap();
        assert!(matches!(
            ConnectionSet::open(store),
            Err(ConsoleError::PersistenceFormat(_))
        ));
    }
}
