//! Inputs and outputs of the backend operations

use chrono::{DateTime, Utc};
use eosgw_client::{DownloadStream, UploadStream};

/// Default and maximum number of keys per listing page
pub const MAX_KEYS: u32 = 1000;

/// ListBuckets request
#[derive(Clone, Debug, Default)]
pub struct ListBucketsInput {
    /// Only buckets whose name starts with this prefix
    pub prefix: String,
    /// Name of the last bucket of the previous page
    pub continuation_token: Option<String>,
    /// Page size; unlimited when `None` or 0
    pub max_buckets: Option<u32>,
}

/// ListObjects (V1) request
#[derive(Clone, Debug, Default)]
pub struct ListObjectsInput {
    pub bucket: String,
    pub prefix: String,
    pub delimiter: Option<String>,
    pub marker: Option<String>,
    pub max_keys: Option<u32>,
}

/// ListObjectsV2 request
#[derive(Clone, Debug, Default)]
pub struct ListObjectsV2Input {
    pub bucket: String,
    pub prefix: String,
    pub delimiter: Option<String>,
    pub continuation_token: Option<String>,
    pub start_after: Option<String>,
    pub max_keys: Option<u32>,
}

/// PutObject request
pub struct PutObjectInput {
    pub bucket: String,
    pub key: String,
    pub body: UploadStream,
    pub content_length: u64,
}

impl PutObjectInput {
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        body: UploadStream,
        content_length: u64,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            body,
            content_length,
        }
    }
}

/// PutObject response
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PutObjectOutput {
    /// Hex MD5 of the bytes sent, when digest computation is enabled
    pub etag: Option<String>,
}

/// Metadata of a stored object (HeadObject response)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub content_length: u64,
    pub etag: String,
    pub last_modified: DateTime<Utc>,
}

/// GetObject response
pub struct GetObjectOutput {
    pub info: ObjectInfo,
    pub body: DownloadStream,
}

impl std::fmt::Debug for GetObjectOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetObjectOutput")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}
