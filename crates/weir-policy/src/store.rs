//! Named policy snapshots.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::debug;

use crate::resolver::Policy;

/// A registry of named, immutable policy snapshots.
///
/// Route groups select their policy by identifier ("api", "ui", ...).
/// Policies are published whole: `publish` swaps the `Arc` for a name
/// atomically, so a reader holding a snapshot keeps evaluating against a
/// consistent rule set while a reload lands. Nothing is ever mutated in
/// place.
#[derive(Debug)]
pub struct PolicyStore<R> {
    policies: RwLock<HashMap<String, Arc<Policy<R>>>>,
}

impl<R: Clone> PolicyStore<R> {
    pub fn new() -> Self {
        Self {
            policies: RwLock::new(HashMap::new()),
        }
    }

    /// Publish a policy under a name, replacing any previous snapshot.
    pub fn publish(&self, name: impl Into<String>, policy: Policy<R>) {
        let name = name.into();
        debug!("publishing policy snapshot {name:?}");
        self.policies
            .write()
            .expect("policy store lock poisoned")
            .insert(name, Arc::new(policy));
    }

    /// Fetch the current snapshot for a name.
    pub fn get(&self, name: &str) -> Option<Arc<Policy<R>>> {
        self.policies
            .read()
            .expect("policy store lock poisoned")
            .get(name)
            .cloned()
    }

    /// Names with a published snapshot.
    pub fn names(&self) -> Vec<String> {
        self.policies
            .read()
            .expect("policy store lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Anonymous, RuleSet};

    const NONE: &[&str] = &[];

    #[test]
    fn test_publish_and_get() {
        let store = PolicyStore::new();
        store.publish("api", Policy::new(RuleSet::new(NONE, &["*"], NONE).unwrap(), 401));

        let api = store.get("api").unwrap();
        assert!(!api.evaluate::<Anonymous>(Some("/flows"), None).is_permit());
        assert!(store.get("ui").is_none());
    }

    #[test]
    fn test_republish_swaps_snapshot_for_new_readers() {
        let store = PolicyStore::new();
        store.publish("api", Policy::new(RuleSet::new(NONE, &["*"], NONE).unwrap(), 401));

        // A reader that grabbed the old snapshot keeps it.
        let old = store.get("api").unwrap();

        store.publish("api", Policy::new(RuleSet::empty(), 401));
        let new = store.get("api").unwrap();

        assert!(!old.evaluate::<Anonymous>(Some("/flows"), None).is_permit());
        assert!(new.evaluate::<Anonymous>(Some("/flows"), None).is_permit());
    }
}
