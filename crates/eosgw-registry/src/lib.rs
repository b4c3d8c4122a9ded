//! eosgw Registry - Bucket registry
//!
//! Maps external bucket names to backing paths, records which user owns
//! which bucket and stores each user's default bucket path.
//!
//! Two drivers implement [`BucketRegistry`]:
//! - [`MemoryRegistry`]: in-process, lost on restart
//! - [`LocalRegistry`]: a directory tree on the local filesystem

pub mod error;
pub mod local;
pub mod memory;

pub use error::{RegistryError, Result};
pub use local::LocalRegistry;
pub use memory::MemoryRegistry;

use eosgw_common::{Bucket, RegistryConfig, RegistryDriver};
use std::sync::Arc;
use tracing::info;

/// Durable mapping of buckets, assignments and default paths
pub trait BucketRegistry: Send + Sync {
    /// Register a bucket; fails with `AlreadyExists` if the name is taken
    fn create_bucket(&self, bucket: Bucket) -> Result<()>;

    fn get_bucket(&self, name: &str) -> Result<Bucket>;

    /// Remove a bucket and every assignment of it
    fn delete_bucket(&self, name: &str) -> Result<()>;

    /// All buckets, ordered by name
    fn list_buckets(&self) -> Result<Vec<Bucket>>;

    /// Assign a registered bucket to `uid`
    fn assign_bucket(&self, name: &str, uid: u64) -> Result<()>;

    /// Remove an assignment; removing a missing one is not an error
    fn unassign_bucket(&self, name: &str, uid: u64) -> Result<()>;

    fn is_assigned(&self, name: &str, uid: u64) -> Result<bool>;

    /// Names of the buckets assigned to `uid`, ordered by name
    fn list_buckets_by_user(&self, uid: u64) -> Result<Vec<String>>;

    /// Parent directory for new buckets of `uid`, if set
    fn default_bucket_path(&self, uid: u64) -> Result<Option<String>>;

    fn set_default_bucket_path(&self, uid: u64, path: &str) -> Result<()>;
}

/// Open the registry selected by the configuration
pub fn open_registry(config: &RegistryConfig) -> Result<Arc<dyn BucketRegistry>> {
    match config.driver {
        RegistryDriver::Memory => {
            info!("Using in-memory bucket registry");
            Ok(Arc::new(MemoryRegistry::new()))
        }
        RegistryDriver::Local => {
            let registry = LocalRegistry::open(&config.folder)?;
            info!("Using local bucket registry at {}", registry.base().display());
            Ok(Arc::new(registry))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Behavior every driver must share
    pub fn check_contract(registry: &dyn BucketRegistry) {
        registry.create_bucket(Bucket::new("beta", "/eos/u/beta")).unwrap();
        registry.create_bucket(Bucket::new("alpha", "/eos/u/alpha")).unwrap();

        let err = registry
            .create_bucket(Bucket::new("alpha", "/eos/other/alpha"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyExists(_)));
        assert_eq!(registry.get_bucket("alpha").unwrap().path, "/eos/u/alpha");

        let names: Vec<_> = registry
            .list_buckets()
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["alpha", "beta"]);

        // assignments
        assert!(matches!(
            registry.assign_bucket("missing", 1000),
            Err(RegistryError::NotFound(_))
        ));
        registry.assign_bucket("beta", 1000).unwrap();
        registry.assign_bucket("alpha", 1000).unwrap();
        registry.assign_bucket("alpha", 0).unwrap();
        assert!(registry.is_assigned("alpha", 1000).unwrap());
        assert!(!registry.is_assigned("alpha", 1001).unwrap());
        assert_eq!(
            registry.list_buckets_by_user(1000).unwrap(),
            vec!["alpha", "beta"]
        );
        assert_eq!(registry.list_buckets_by_user(0).unwrap(), vec!["alpha"]);
        assert!(registry.list_buckets_by_user(42).unwrap().is_empty());

        registry.unassign_bucket("beta", 1000).unwrap();
        registry.unassign_bucket("beta", 1000).unwrap();
        assert!(!registry.is_assigned("beta", 1000).unwrap());

        // default paths
        assert_eq!(registry.default_bucket_path(1000).unwrap(), None);
        registry.set_default_bucket_path(1000, "/eos/u").unwrap();
        assert_eq!(
            registry.default_bucket_path(1000).unwrap().as_deref(),
            Some("/eos/u")
        );
        assert_eq!(registry.list_buckets_by_user(1000).unwrap(), vec!["alpha"]);

        // delete drops assignments
        registry.delete_bucket("alpha").unwrap();
        assert!(matches!(
            registry.get_bucket("alpha"),
            Err(RegistryError::NotFound(_))
        ));
        assert!(matches!(
            registry.delete_bucket("alpha"),
            Err(RegistryError::NotFound(_))
        ));
        assert!(!registry.is_assigned("alpha", 1000).unwrap());
        assert!(!registry.is_assigned("alpha", 0).unwrap());
        assert!(registry.list_buckets_by_user(1000).unwrap().is_empty());
        assert_eq!(registry.list_buckets().unwrap().len(), 1);

        // a deleted name can be registered again
        registry.create_bucket(Bucket::new("alpha", "/eos/v/alpha")).unwrap();
        assert!(!registry.is_assigned("alpha", 1000).unwrap());
    }

    #[test]
    fn test_open_memory() {
        let registry = open_registry(&RegistryConfig::default()).unwrap();
        check_contract(registry.as_ref());
    }

    #[test]
    fn test_open_local() {
        let dir = tempfile::tempdir().unwrap();
        let config = RegistryConfig {
            driver: RegistryDriver::Local,
            folder: dir.path().to_path_buf(),
        };
        let registry = open_registry(&config).unwrap();
        check_contract(registry.as_ref());
        assert!(dir.path().join("buckets").join("beta").is_file());
    }
}
