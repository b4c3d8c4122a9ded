//! In-memory registry driver

use crate::BucketRegistry;
use crate::error::{RegistryError, Result};
use eosgw_common::Bucket;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Default)]
struct Inner {
    buckets: BTreeMap<String, Bucket>,
    assignments: HashMap<u64, BTreeSet<String>>,
    default_paths: HashMap<u64, String>,
}

/// Registry kept in process memory
#[derive(Default)]
pub struct MemoryRegistry {
    inner: RwLock<Inner>,
}

impl MemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl BucketRegistry for MemoryRegistry {
    fn create_bucket(&self, bucket: Bucket) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.buckets.contains_key(&bucket.name) {
            return Err(RegistryError::AlreadyExists(bucket.name));
        }
        inner.buckets.insert(bucket.name.clone(), bucket);
        Ok(())
    }

    fn get_bucket(&self, name: &str) -> Result<Bucket> {
        self.inner
            .read()
            .buckets
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    fn delete_bucket(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.buckets.remove(name).is_none() {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        for names in inner.assignments.values_mut() {
            names.remove(name);
        }
        Ok(())
    }

    fn list_buckets(&self) -> Result<Vec<Bucket>> {
        Ok(self.inner.read().buckets.values().cloned().collect())
    }

    fn assign_bucket(&self, name: &str, uid: u64) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.buckets.contains_key(name) {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        inner
            .assignments
            .entry(uid)
            .or_default()
            .insert(name.to_string());
        Ok(())
    }

    fn unassign_bucket(&self, name: &str, uid: u64) -> Result<()> {
        if let Some(names) = self.inner.write().assignments.get_mut(&uid) {
            names.remove(name);
        }
        Ok(())
    }

    fn is_assigned(&self, name: &str, uid: u64) -> Result<bool> {
        Ok(self
            .inner
            .read()
            .assignments
            .get(&uid)
            .is_some_and(|names| names.contains(name)))
    }

    fn list_buckets_by_user(&self, uid: u64) -> Result<Vec<String>> {
        Ok(self
            .inner
            .read()
            .assignments
            .get(&uid)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn default_bucket_path(&self, uid: u64) -> Result<Option<String>> {
        Ok(self.inner.read().default_paths.get(&uid).cloned())
    }

    fn set_default_bucket_path(&self, uid: u64, path: &str) -> Result<()> {
        self.inner
            .write()
            .default_paths
            .insert(uid, path.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::check_contract;

    #[test]
    fn test_contract() {
        check_contract(&MemoryRegistry::new());
    }

    #[test]
    fn test_concurrent_create_single_winner() {
        let registry = std::sync::Arc::new(MemoryRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry
                        .create_bucket(Bucket::new("shared", format!("/eos/{i}/shared")))
                        .is_ok()
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
    }
}
