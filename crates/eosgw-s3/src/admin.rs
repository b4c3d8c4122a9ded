//! Operator actions on buckets
//!
//! Provisioning is shared with the S3 `CreateBucket` path: the registry entry
//! is written first, then the assignment, then the backing directory. A
//! failing step undoes the ones before it.

use crate::eos::{DIR_MODE, for_each_node};
use crate::error::{Result, S3Error};
use eosgw_client::{ListFilters, Namespace, cancellable};
use eosgw_common::{Bucket, Identity};
use eosgw_registry::BucketRegistry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Register `bucket`, assign it to `owner` and create its backing directory
pub(crate) async fn provision_bucket(
    meta: &dyn Namespace,
    registry: &dyn BucketRegistry,
    owner: Identity,
    bucket: Bucket,
    cancel: &CancellationToken,
) -> Result<Bucket> {
    registry.create_bucket(bucket.clone())?;

    if let Err(e) = registry.assign_bucket(&bucket.name, owner.uid) {
        if let Err(undo) = registry.delete_bucket(&bucket.name) {
            warn!("Failed to unregister bucket {}: {}", bucket.name, undo);
        }
        return Err(e.into());
    }

    let created = cancellable(cancel, meta.mkdir(owner, &bucket.path, DIR_MODE, true)).await;
    if let Err(e) = created {
        warn!(
            "Creating directory {} for bucket {} failed: {}",
            bucket.path, bucket.name, e
        );
        if let Err(undo) = registry.unassign_bucket(&bucket.name, owner.uid) {
            warn!("Failed to unassign bucket {}: {}", bucket.name, undo);
        }
        if let Err(undo) = registry.delete_bucket(&bucket.name) {
            warn!("Failed to unregister bucket {}: {}", bucket.name, undo);
        }
        return Err(e.into());
    }

    info!(
        "Created bucket {} at {} for {}",
        bucket.name, bucket.path, owner
    );
    Ok(bucket)
}

/// Administrative entry points, outside of the S3 request path
pub struct Admin {
    meta: Arc<dyn Namespace>,
    registry: Arc<dyn BucketRegistry>,
    cancel: CancellationToken,
}

impl Admin {
    pub fn new(meta: Arc<dyn Namespace>, registry: Arc<dyn BucketRegistry>) -> Self {
        Self {
            meta,
            registry,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Create bucket `name` backed by `path`, owned by `owner`
    pub async fn create_bucket_for(
        &self,
        owner: Identity,
        name: &str,
        path: &str,
    ) -> Result<Bucket> {
        provision_bucket(
            self.meta.as_ref(),
            self.registry.as_ref(),
            owner,
            Bucket::new(name, path),
            &self.cancel,
        )
        .await
    }

    /// Set the parent directory of `owner`'s future buckets.
    ///
    /// The directory must exist and be visible to the owner.
    pub async fn set_default_bucket_path(&self, owner: Identity, path: &str) -> Result<()> {
        let node = cancellable(&self.cancel, self.meta.stat(owner, path))
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    S3Error::InvalidRequest(format!("{path} does not exist"))
                } else {
                    e.into()
                }
            })?;
        if !node.is_container() {
            return Err(S3Error::InvalidRequest(format!("{path} is not a directory")));
        }

        self.registry.set_default_bucket_path(owner.uid, path)?;
        info!("Default bucket path of uid {} set to {}", owner.uid, path);
        Ok(())
    }

    pub fn default_bucket_path(&self, uid: u64) -> Result<Option<String>> {
        Ok(self.registry.default_bucket_path(uid)?)
    }

    pub fn bucket(&self, name: &str) -> Result<Bucket> {
        Ok(self.registry.get_bucket(name)?)
    }

    /// Remove everything below a bucket's backing directory.
    ///
    /// The directory is read as `operator`; entries are removed as the
    /// directory's owner. Failed removals are logged and skipped. Returns
    /// the number of entries removed.
    pub async fn purge_bucket(&self, name: &str, operator: Identity) -> Result<usize> {
        let bucket = self.bucket(name)?;

        let dir = cancellable(&self.cancel, self.meta.stat(operator, &bucket.path))
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    S3Error::InvalidRequest(format!("{} does not exist", bucket.path))
                } else {
                    e.into()
                }
            })?;
        if !dir.is_container() {
            return Err(S3Error::InvalidRequest(format!(
                "{} is not a directory",
                bucket.path
            )));
        }
        let owner = Identity::new(dir.uid, dir.gid);

        let listing = cancellable(
            &self.cancel,
            self.meta.list(operator, &bucket.path, &ListFilters::shallow()),
        )
        .await?;
        let mut entries = Vec::new();
        for_each_node(listing, &self.cancel, |node| entries.push(node.path)).await?;

        let mut removed = 0;
        for path in entries {
            match cancellable(&self.cancel, self.meta.remove(owner, &path, true)).await {
                Ok(()) => removed += 1,
                Err(eosgw_client::ClientError::Cancelled) => return Err(S3Error::Cancelled),
                Err(e) => warn!("Failed to remove {}: {}", path, e),
            }
        }

        info!(
            "Purged {} of bucket {} ({} entries removed)",
            bucket.path, name, removed
        );
        Ok(removed)
    }
}
