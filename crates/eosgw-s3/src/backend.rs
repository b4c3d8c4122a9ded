//! The S3 operation surface a gateway calls into
//!
//! Every operation has a default answering `NotImplemented`, so a backend
//! only overrides what it supports.

use crate::context::RequestContext;
use crate::error::{Result, S3Error};
use crate::types::{
    GetObjectOutput, ListBucketsInput, ListObjectsInput, ListObjectsV2Input, ObjectInfo,
    PutObjectInput, PutObjectOutput,
};
use crate::xml::{ListAllMyBucketsResult, ListObjectsResult, ListObjectsV2Result};
use async_trait::async_trait;
use eosgw_client::UploadStream;
use std::collections::HashMap;

/// `AccessDenied` without a caller identity, `NotImplemented` otherwise
fn unsupported<T>(ctx: &RequestContext, operation: &'static str) -> Result<T> {
    ctx.identity()?;
    Err(S3Error::NotImplemented(operation))
}

/// S3 bucket and object operations
#[async_trait]
pub trait S3Backend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str {
        "unsupported"
    }

    // =========== Buckets ===========

    async fn list_buckets(
        &self,
        ctx: &RequestContext,
        _input: ListBucketsInput,
    ) -> Result<ListAllMyBucketsResult> {
        unsupported(ctx, "ListBuckets")
    }

    async fn create_bucket(&self, ctx: &RequestContext, _bucket: &str) -> Result<()> {
        unsupported(ctx, "CreateBucket")
    }

    async fn head_bucket(&self, ctx: &RequestContext, _bucket: &str) -> Result<()> {
        unsupported(ctx, "HeadBucket")
    }

    async fn delete_bucket(&self, ctx: &RequestContext, _bucket: &str) -> Result<()> {
        unsupported(ctx, "DeleteBucket")
    }

    /// Bucket policy as a JSON document
    async fn get_bucket_policy(&self, ctx: &RequestContext, _bucket: &str) -> Result<String> {
        unsupported(ctx, "GetBucketPolicy")
    }

    async fn get_bucket_versioning(&self, ctx: &RequestContext, _bucket: &str) -> Result<bool> {
        unsupported(ctx, "GetBucketVersioning")
    }

    async fn put_bucket_versioning(
        &self,
        ctx: &RequestContext,
        _bucket: &str,
        _enabled: bool,
    ) -> Result<()> {
        unsupported(ctx, "PutBucketVersioning")
    }

    async fn get_bucket_tagging(
        &self,
        ctx: &RequestContext,
        _bucket: &str,
    ) -> Result<HashMap<String, String>> {
        unsupported(ctx, "GetBucketTagging")
    }

    async fn put_bucket_tagging(
        &self,
        ctx: &RequestContext,
        _bucket: &str,
        _tags: HashMap<String, String>,
    ) -> Result<()> {
        unsupported(ctx, "PutBucketTagging")
    }

    async fn delete_bucket_tagging(&self, ctx: &RequestContext, _bucket: &str) -> Result<()> {
        unsupported(ctx, "DeleteBucketTagging")
    }

    async fn get_bucket_cors(&self, ctx: &RequestContext, _bucket: &str) -> Result<String> {
        unsupported(ctx, "GetBucketCors")
    }

    async fn put_bucket_cors(
        &self,
        ctx: &RequestContext,
        _bucket: &str,
        _cors: String,
    ) -> Result<()> {
        unsupported(ctx, "PutBucketCors")
    }

    async fn delete_bucket_cors(&self, ctx: &RequestContext, _bucket: &str) -> Result<()> {
        unsupported(ctx, "DeleteBucketCors")
    }

    /// Object lock configuration as a JSON document
    async fn get_object_lock_configuration(
        &self,
        ctx: &RequestContext,
        _bucket: &str,
    ) -> Result<String> {
        unsupported(ctx, "GetObjectLockConfiguration")
    }

    async fn put_object_lock_configuration(
        &self,
        ctx: &RequestContext,
        _bucket: &str,
        _config: String,
    ) -> Result<()> {
        unsupported(ctx, "PutObjectLockConfiguration")
    }

    // =========== Objects ===========

    async fn put_object(
        &self,
        ctx: &RequestContext,
        _input: PutObjectInput,
    ) -> Result<PutObjectOutput> {
        unsupported(ctx, "PutObject")
    }

    async fn head_object(
        &self,
        ctx: &RequestContext,
        _bucket: &str,
        _key: &str,
    ) -> Result<ObjectInfo> {
        unsupported(ctx, "HeadObject")
    }

    async fn get_object(
        &self,
        ctx: &RequestContext,
        _bucket: &str,
        _key: &str,
    ) -> Result<GetObjectOutput> {
        unsupported(ctx, "GetObject")
    }

    async fn delete_object(&self, ctx: &RequestContext, _bucket: &str, _key: &str) -> Result<()> {
        unsupported(ctx, "DeleteObject")
    }

    async fn copy_object(
        &self,
        ctx: &RequestContext,
        _src_bucket: &str,
        _src_key: &str,
        _dst_bucket: &str,
        _dst_key: &str,
    ) -> Result<PutObjectOutput> {
        unsupported(ctx, "CopyObject")
    }

    async fn list_objects(
        &self,
        ctx: &RequestContext,
        _input: ListObjectsInput,
    ) -> Result<ListObjectsResult> {
        unsupported(ctx, "ListObjects")
    }

    async fn list_objects_v2(
        &self,
        ctx: &RequestContext,
        _input: ListObjectsV2Input,
    ) -> Result<ListObjectsV2Result> {
        unsupported(ctx, "ListObjectsV2")
    }

    /// Object ACL as a JSON document
    async fn get_object_acl(&self, ctx: &RequestContext, _bucket: &str, _key: &str) -> Result<String> {
        unsupported(ctx, "GetObjectAcl")
    }

    async fn put_object_acl(
        &self,
        ctx: &RequestContext,
        _bucket: &str,
        _key: &str,
        _acl: String,
    ) -> Result<()> {
        unsupported(ctx, "PutObjectAcl")
    }

    async fn get_object_tagging(
        &self,
        ctx: &RequestContext,
        _bucket: &str,
        _key: &str,
    ) -> Result<HashMap<String, String>> {
        unsupported(ctx, "GetObjectTagging")
    }

    async fn put_object_tagging(
        &self,
        ctx: &RequestContext,
        _bucket: &str,
        _key: &str,
        _tags: HashMap<String, String>,
    ) -> Result<()> {
        unsupported(ctx, "PutObjectTagging")
    }

    async fn delete_object_tagging(
        &self,
        ctx: &RequestContext,
        _bucket: &str,
        _key: &str,
    ) -> Result<()> {
        unsupported(ctx, "DeleteObjectTagging")
    }

    // =========== Multipart ===========

    /// Returns the upload ID
    async fn create_multipart_upload(
        &self,
        ctx: &RequestContext,
        _bucket: &str,
        _key: &str,
    ) -> Result<String> {
        unsupported(ctx, "CreateMultipartUpload")
    }

    /// Returns the part ETag
    async fn upload_part(
        &self,
        ctx: &RequestContext,
        _bucket: &str,
        _key: &str,
        _upload_id: &str,
        _part_number: u32,
        _body: UploadStream,
        _content_length: u64,
    ) -> Result<String> {
        unsupported(ctx, "UploadPart")
    }

    async fn complete_multipart_upload(
        &self,
        ctx: &RequestContext,
        _bucket: &str,
        _key: &str,
        _upload_id: &str,
        _parts: Vec<(u32, String)>,
    ) -> Result<PutObjectOutput> {
        unsupported(ctx, "CompleteMultipartUpload")
    }

    async fn abort_multipart_upload(
        &self,
        ctx: &RequestContext,
        _bucket: &str,
        _key: &str,
        _upload_id: &str,
    ) -> Result<()> {
        unsupported(ctx, "AbortMultipartUpload")
    }
}
