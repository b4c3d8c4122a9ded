//! S3 backend over the EOS namespace

use crate::admin::{Admin, provision_bucket};
use crate::backend::S3Backend;
use crate::context::RequestContext;
use crate::error::{Result, S3Error};
use crate::listing::{self, Collector, Page};
use crate::types::{
    GetObjectOutput, ListBucketsInput, ListObjectsInput, ListObjectsV2Input, MAX_KEYS, ObjectInfo,
    PutObjectInput, PutObjectOutput,
};
use crate::xml::{
    BucketEntry, Buckets, ListAllMyBucketsResult, ListObjectsResult, ListObjectsV2Result, Owner,
    format_timestamp,
};
use async_trait::async_trait;
use eosgw_client::{
    ClientError, DataPlane, HttpDataClient, ListFilters, MetaClient, Namespace, NodeStream,
    RemoteNode, UploadStream, cancellable, resolve_username,
};
use eosgw_common::{Bucket, Config, Identity, S3Config};
use eosgw_registry::{BucketRegistry, RegistryError, open_registry};
use futures::{StreamExt, TryStreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Mode of directories created for buckets and key prefixes
pub const DIR_MODE: u32 = 0o755;

/// Translation backend: S3 operations on top of the remote namespace
pub struct EosBackend {
    config: S3Config,
    meta: Arc<dyn Namespace>,
    data: Arc<dyn DataPlane>,
    registry: Arc<dyn BucketRegistry>,
}

impl EosBackend {
    pub fn new(
        config: S3Config,
        meta: Arc<dyn Namespace>,
        data: Arc<dyn DataPlane>,
        registry: Arc<dyn BucketRegistry>,
    ) -> Self {
        Self {
            config,
            meta,
            data,
            registry,
        }
    }

    /// Build the backend with the gRPC/HTTP clients and the configured registry
    pub fn connect(config: &Config) -> Result<Self> {
        config.validate()?;
        let meta = MetaClient::new(&config.eos)?;
        let data = HttpDataClient::new(&config.eos)?;
        let registry = open_registry(&config.registry)?;
        info!(
            "EOS backend connected (grpc: {}, http: {})",
            config.eos.grpc_url, config.eos.http_url
        );
        Ok(Self::new(
            config.s3.clone(),
            Arc::new(meta),
            Arc::new(data),
            registry,
        ))
    }

    /// Operator actions sharing this backend's clients
    #[must_use]
    pub fn admin(&self) -> Admin {
        Admin::new(self.meta.clone(), self.registry.clone())
    }

    fn bucket(&self, name: &str) -> Result<Bucket> {
        Ok(self.registry.get_bucket(name)?)
    }

    /// Stat an object; anything but an existing file is `NoSuchKey`
    async fn stat_object(
        &self,
        ctx: &RequestContext,
        who: Identity,
        path: &str,
        key: &str,
    ) -> Result<RemoteNode> {
        match cancellable(&ctx.cancel, self.meta.stat(who, path)).await {
            Ok(node) if node.is_file() => Ok(node),
            Ok(_) => Err(S3Error::NoSuchKey(key.to_string())),
            Err(e) if e.is_not_found() => Err(S3Error::NoSuchKey(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Make sure the parent directory of an object exists
    async fn ensure_parent(&self, ctx: &RequestContext, who: Identity, path: &str) -> Result<()> {
        let Some((parent, _)) = path.rsplit_once('/') else {
            return Ok(());
        };
        match cancellable(&ctx.cancel, self.meta.stat(who, parent)).await {
            Ok(node) if node.is_container() => Ok(()),
            Ok(_) => Err(S3Error::InvalidRequest(format!(
                "{parent} exists and is not a directory"
            ))),
            Err(e) if e.is_not_found() => {
                debug!("Creating parent directory {}", parent);
                cancellable(&ctx.cancel, self.meta.mkdir(who, parent, DIR_MODE, true)).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Walk the namespace for a listing request and page the result
    async fn list_page(
        &self,
        ctx: &RequestContext,
        bucket: &Bucket,
        prefix: &str,
        delimiter: Option<&str>,
        marker: Option<&str>,
        max_keys: u32,
    ) -> Result<Page> {
        let delimited = match delimiter {
            None | Some("") => false,
            Some("/") => true,
            Some(other) => {
                return Err(S3Error::InvalidRequest(format!(
                    "unsupported delimiter {other:?}, only \"/\" is allowed"
                )));
            }
        };
        let who = ctx.identity()?;

        let (head, tail) = listing::split_prefix(prefix);
        let dir = listing::listing_dir(&bucket.path, head);

        match cancellable(&ctx.cancel, self.meta.stat(who, &dir)).await {
            Ok(node) if node.is_container() => {}
            Ok(_) => return Ok(Page::default()),
            Err(e) if e.is_not_found() => return Ok(Page::default()),
            Err(e) => return Err(e.into()),
        }

        // the leaf-name filter only holds for direct children
        let filters = if delimited {
            ListFilters::shallow().with_name_prefix(tail)
        } else {
            ListFilters::recursive()
        };
        let stream = cancellable(&ctx.cancel, self.meta.list(who, &dir, &filters)).await?;

        let mut collector =
            Collector::new(&bucket.path, prefix, delimited).window(marker, max_keys);
        for_each_node(stream, &ctx.cancel, |node| collector.push(node)).await?;
        Ok(collector.finish())
    }
}

/// Drain a listing stream, giving up when `cancel` fires
pub(crate) async fn for_each_node<F>(
    mut stream: NodeStream,
    cancel: &CancellationToken,
    mut f: F,
) -> Result<()>
where
    F: FnMut(RemoteNode) + Send,
{
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(S3Error::Cancelled),
            next = stream.next() => next,
        };
        match next {
            Some(node) => f(node?),
            None => return Ok(()),
        }
    }
}

/// Select one page of buckets, resuming after `token`
fn page_buckets(
    buckets: Vec<Bucket>,
    prefix: &str,
    token: Option<&str>,
    max: Option<u32>,
) -> (Vec<Bucket>, Option<String>) {
    let mut remaining = buckets
        .into_iter()
        .filter(|b| b.name.starts_with(prefix))
        .filter(|b| token.is_none_or(|token| b.name.as_str() > token));

    let page: Vec<Bucket> = match max.filter(|max| *max > 0) {
        Some(max) => remaining.by_ref().take(max as usize).collect(),
        None => remaining.by_ref().collect(),
    };

    let next = if remaining.next().is_some() {
        page.last().map(|b| b.name.clone())
    } else {
        None
    };
    (page, next)
}

fn bucket_policy(sid: &str, effect: &str, principal: &str, bucket: &str) -> String {
    let policy = serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Sid": sid,
            "Effect": effect,
            "Principal": { "AWS": principal },
            "Action": "s3:*",
            "Resource": [
                format!("arn:aws:s3:::{bucket}"),
                format!("arn:aws:s3:::{bucket}/*"),
            ],
        }],
    });
    serde_json::to_string_pretty(&policy).unwrap_or_default()
}

#[async_trait]
impl S3Backend for EosBackend {
    fn name(&self) -> &'static str {
        "EOS"
    }

    async fn list_buckets(
        &self,
        ctx: &RequestContext,
        input: ListBucketsInput,
    ) -> Result<ListAllMyBucketsResult> {
        let who = ctx.identity()?;
        debug!("ListBuckets uid={} admin={}", who.uid, ctx.is_admin);

        let buckets = if ctx.is_admin {
            self.registry.list_buckets()?
        } else {
            let mut assigned = Vec::new();
            for name in self.registry.list_buckets_by_user(who.uid)? {
                match self.registry.get_bucket(&name) {
                    Ok(bucket) => assigned.push(bucket),
                    Err(RegistryError::NotFound(_)) => {}
                    Err(e) => return Err(e.into()),
                }
            }
            assigned
        };

        let (page, next) = page_buckets(
            buckets,
            &input.prefix,
            input.continuation_token.as_deref(),
            input.max_buckets,
        );

        Ok(ListAllMyBucketsResult {
            owner: Owner::new(self.config.owner_id.clone()),
            buckets: Buckets {
                bucket: page
                    .into_iter()
                    .map(|b| BucketEntry {
                        creation_date: format_timestamp(&b.created_at),
                        name: b.name,
                    })
                    .collect(),
            },
            continuation_token: next,
            prefix: (!input.prefix.is_empty()).then_some(input.prefix),
        })
    }

    async fn create_bucket(&self, ctx: &RequestContext, bucket: &str) -> Result<()> {
        let who = ctx.identity()?;
        debug!("CreateBucket {} uid={}", bucket, who.uid);

        match self.registry.get_bucket(bucket) {
            Ok(_) => return Err(S3Error::BucketAlreadyExists(bucket.to_string())),
            Err(RegistryError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let parent = self.registry.default_bucket_path(who.uid)?.ok_or_else(|| {
            S3Error::InvalidQueryParams(format!("no default bucket path for uid {}", who.uid))
        })?;

        let entry = Bucket::new(bucket, Bucket::backing_path(&parent, bucket));
        provision_bucket(
            self.meta.as_ref(),
            self.registry.as_ref(),
            who,
            entry,
            &ctx.cancel,
        )
        .await?;
        Ok(())
    }

    async fn head_bucket(&self, ctx: &RequestContext, bucket: &str) -> Result<()> {
        ctx.identity()?;
        self.bucket(bucket).map(|_| ())
    }

    async fn delete_bucket(&self, ctx: &RequestContext, bucket: &str) -> Result<()> {
        let who = ctx.identity()?;
        debug!("DeleteBucket {} uid={}", bucket, who.uid);
        let entry = self.bucket(bucket)?;

        let node = cancellable(&ctx.cancel, self.meta.stat(who, &entry.path)).await?;
        if !node.is_container() {
            return Err(S3Error::Internal(format!(
                "backing path {} of bucket {} is not a directory",
                entry.path, bucket
            )));
        }
        if node.children != 0 {
            return Err(S3Error::BucketNotEmpty(bucket.to_string()));
        }

        cancellable(&ctx.cancel, self.meta.rmdir(who, &entry.path)).await?;
        self.registry.delete_bucket(bucket)?;
        info!("Deleted bucket {} ({})", bucket, entry.path);
        Ok(())
    }

    async fn get_bucket_policy(&self, ctx: &RequestContext, bucket: &str) -> Result<String> {
        let who = ctx.identity()?;
        let username = resolve_username(who).await;
        let policy = if self.registry.is_assigned(bucket, who.uid)? {
            bucket_policy("AllowAllActionsToUser", "Allow", &username, bucket)
        } else {
            bucket_policy("DenyAllActionsToUser", "Deny", &username, bucket)
        };
        Ok(policy)
    }

    async fn get_object_lock_configuration(
        &self,
        ctx: &RequestContext,
        _bucket: &str,
    ) -> Result<String> {
        ctx.identity()?;
        Ok("{}".to_string())
    }

    async fn put_object(
        &self,
        ctx: &RequestContext,
        input: PutObjectInput,
    ) -> Result<PutObjectOutput> {
        let who = ctx.identity()?;
        debug!(
            "PutObject {}/{} ({} bytes)",
            input.bucket, input.key, input.content_length
        );
        let bucket = self.bucket(&input.bucket)?;
        let path = bucket.object_path(&input.key);

        if input.key.contains('/') {
            self.ensure_parent(ctx, who, &path).await?;
        }

        // digest of the bytes handed to the data plane, not of what the remote stored
        let (body, digest): (UploadStream, _) = if self.config.compute_md5 {
            let digest = Arc::new(Mutex::new(md5::Context::new()));
            let sink = digest.clone();
            let body = input.body.inspect_ok(move |chunk| sink.lock().consume(chunk));
            (Box::pin(body), Some(digest))
        } else {
            (input.body, None)
        };

        cancellable(
            &ctx.cancel,
            self.data.upload(who, &path, body, input.content_length),
        )
        .await?;

        let etag = digest.map(|digest| {
            let context = std::mem::replace(&mut *digest.lock(), md5::Context::new());
            format!("{:x}", context.compute())
        });
        Ok(PutObjectOutput { etag })
    }

    async fn head_object(
        &self,
        ctx: &RequestContext,
        bucket: &str,
        key: &str,
    ) -> Result<ObjectInfo> {
        let who = ctx.identity()?;
        let path = self.bucket(bucket)?.object_path(key);
        let node = self.stat_object(ctx, who, &path, key).await?;
        Ok(ObjectInfo {
            key: key.to_string(),
            content_length: node.size,
            etag: node.etag,
            last_modified: node.mtime,
        })
    }

    async fn get_object(
        &self,
        ctx: &RequestContext,
        bucket: &str,
        key: &str,
    ) -> Result<GetObjectOutput> {
        let who = ctx.identity()?;
        debug!("GetObject {}/{}", bucket, key);
        let path = self.bucket(bucket)?.object_path(key);
        let node = self.stat_object(ctx, who, &path, key).await?;

        let download = cancellable(&ctx.cancel, self.data.download(who, &path))
            .await
            .map_err(|e| match e {
                ClientError::UnexpectedStatus { status: 404, .. } => {
                    S3Error::NoSuchKey(key.to_string())
                }
                other => other.into(),
            })?;

        Ok(GetObjectOutput {
            info: ObjectInfo {
                key: key.to_string(),
                content_length: download.content_length.unwrap_or(node.size),
                etag: node.etag,
                last_modified: node.mtime,
            },
            body: download.stream,
        })
    }

    async fn delete_object(&self, ctx: &RequestContext, bucket: &str, key: &str) -> Result<()> {
        let who = ctx.identity()?;
        debug!("DeleteObject {}/{}", bucket, key);
        let path = self.bucket(bucket)?.object_path(key);
        self.stat_object(ctx, who, &path, key).await?;
        cancellable(&ctx.cancel, self.meta.remove(who, &path, false)).await?;
        Ok(())
    }

    async fn list_objects(
        &self,
        ctx: &RequestContext,
        input: ListObjectsInput,
    ) -> Result<ListObjectsResult> {
        ctx.identity()?;
        debug!("ListObjects {} prefix={:?}", input.bucket, input.prefix);
        let bucket = self.bucket(&input.bucket)?;
        let max_keys = input.max_keys.unwrap_or(MAX_KEYS).min(MAX_KEYS);

        let page = self
            .list_page(
                ctx,
                &bucket,
                &input.prefix,
                input.delimiter.as_deref(),
                input.marker.as_deref(),
                max_keys,
            )
            .await?;

        Ok(ListObjectsResult {
            name: input.bucket,
            prefix: input.prefix,
            marker: input.marker.unwrap_or_default(),
            next_marker: page.next_marker.clone(),
            delimiter: input.delimiter.filter(|d| !d.is_empty()),
            max_keys,
            is_truncated: page.is_truncated,
            contents: page.contents_xml(),
            common_prefixes: page.common_prefixes_xml(),
        })
    }

    async fn list_objects_v2(
        &self,
        ctx: &RequestContext,
        input: ListObjectsV2Input,
    ) -> Result<ListObjectsV2Result> {
        ctx.identity()?;
        debug!("ListObjectsV2 {} prefix={:?}", input.bucket, input.prefix);
        let bucket = self.bucket(&input.bucket)?;
        let max_keys = input.max_keys.unwrap_or(MAX_KEYS).min(MAX_KEYS);
        let marker = input
            .continuation_token
            .as_deref()
            .or(input.start_after.as_deref());

        let page = self
            .list_page(
                ctx,
                &bucket,
                &input.prefix,
                input.delimiter.as_deref(),
                marker,
                max_keys,
            )
            .await?;

        Ok(ListObjectsV2Result {
            name: input.bucket,
            prefix: input.prefix,
            delimiter: input.delimiter.filter(|d| !d.is_empty()),
            max_keys,
            key_count: page.key_count(),
            is_truncated: page.is_truncated,
            continuation_token: input.continuation_token,
            next_continuation_token: page.next_marker.clone(),
            start_after: input.start_after,
            contents: page.contents_xml(),
            common_prefixes: page.common_prefixes_xml(),
        })
    }
}
