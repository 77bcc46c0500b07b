//! Session registry: pod ID to pod record.
//!
//! Storage only. The registry rejects duplicate IDs and otherwise applies
//! no business rules.

use super::model::Pod;
use common::types::PodId;
use std::collections::HashMap;

/// Owned map of live pods.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    pods: HashMap<PodId, Pod>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pod. Returns the pod back if its ID is already taken.
    ///
    /// # Errors
    ///
    /// Returns the rejected pod when the ID collides with a live pod.
    pub fn insert(&mut self, pod: Pod) -> Result<(), Pod> {
        if self.pods.contains_key(&pod.id) {
            return Err(pod);
        }
        self.pods.insert(pod.id.clone(), pod);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, pod_id: &PodId) -> Option<&Pod> {
        self.pods.get(pod_id)
    }

    pub fn get_mut(&mut self, pod_id: &PodId) -> Option<&mut Pod> {
        self.pods.get_mut(pod_id)
    }

    pub fn remove(&mut self, pod_id: &PodId) -> Option<Pod> {
        self.pods.remove(pod_id)
    }

    #[must_use]
    pub fn contains(&self, pod_id: &PodId) -> bool {
        self.pods.contains_key(pod_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pods.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &PodId> {
        self.pods.keys()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::types::UserId;

    fn pod(id: &str) -> Pod {
        Pod::new(PodId::from(id), UserId::new("0xalice"), String::new())
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut registry = SessionRegistry::new();
        registry.insert(pod("aa")).unwrap();

        assert!(registry.contains(&PodId::from("aa")));
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&PodId::from("bb")).is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = SessionRegistry::new();
        registry.insert(pod("aa")).unwrap();

        let mut second = pod("aa");
        second.content_reference = "other".to_string();
        let rejected = registry.insert(second).unwrap_err();

        assert_eq!(rejected.content_reference, "other");
        assert_eq!(registry.get(&PodId::from("aa")).unwrap().content_reference, "");
    }

    #[test]
    fn test_remove() {
        let mut registry = SessionRegistry::new();
        registry.insert(pod("aa")).unwrap();

        assert!(registry.remove(&PodId::from("aa")).is_some());
        assert!(registry.is_empty());
        assert!(registry.remove(&PodId::from("aa")).is_none());
    }
}
