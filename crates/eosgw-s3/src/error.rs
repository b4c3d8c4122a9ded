//! S3 error types and responses

use crate::xml::{ErrorDocument, to_xml_document};
use eosgw_client::ClientError;
use eosgw_registry::RegistryError;
use thiserror::Error;
use tracing::error;

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, S3Error>;

/// S3-specific error type
#[derive(Debug, Error)]
pub enum S3Error {
    #[error("access denied")]
    AccessDenied,

    #[error("no such bucket: {0}")]
    NoSuchBucket(String),

    #[error("no such key: {0}")]
    NoSuchKey(String),

    #[error("bucket already exists: {0}")]
    BucketAlreadyExists(String),

    #[error("bucket not empty: {0}")]
    BucketNotEmpty(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid query parameters: {0}")]
    InvalidQueryParams(String),

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("request cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl S3Error {
    /// Get the S3 error code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::NoSuchBucket(_) => "NoSuchBucket",
            Self::NoSuchKey(_) => "NoSuchKey",
            Self::BucketAlreadyExists(_) => "BucketAlreadyExists",
            Self::BucketNotEmpty(_) => "BucketNotEmpty",
            Self::InvalidRequest(_) => "InvalidRequest",
            Self::InvalidQueryParams(_) => "InvalidArgument",
            Self::NotImplemented(_) => "NotImplemented",
            Self::Cancelled => "RequestCancelled",
            Self::Internal(_) => "InternalError",
        }
    }

    /// Get the HTTP status code
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::AccessDenied => 403,
            Self::NoSuchBucket(_) | Self::NoSuchKey(_) => 404,
            Self::BucketAlreadyExists(_) | Self::BucketNotEmpty(_) => 409,
            Self::InvalidRequest(_) | Self::InvalidQueryParams(_) => 400,
            Self::NotImplemented(_) => 501,
            Self::Cancelled => 499,
            Self::Internal(_) => 500,
        }
    }

    /// Render the S3 `<Error>` document
    #[must_use]
    pub fn to_xml(&self, resource: Option<&str>) -> String {
        let document = ErrorDocument {
            code: self.code().to_string(),
            message: self.to_string(),
            resource: resource.map(str::to_string),
        };
        to_xml_document(&document).unwrap_or_default()
    }
}

impl From<ClientError> for S3Error {
    fn from(err: ClientError) -> Self {
        if matches!(err, ClientError::Cancelled) {
            Self::Cancelled
        } else if err.is_permission_denied() {
            Self::AccessDenied
        } else {
            error!("Remote call failed: {}", err);
            Self::Internal(err.to_string())
        }
    }
}

impl From<RegistryError> for S3Error {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::AlreadyExists(name) => Self::BucketAlreadyExists(name),
            RegistryError::NotFound(name) => Self::NoSuchBucket(name),
            RegistryError::InvalidName(name) => {
                Self::InvalidRequest(format!("invalid bucket name {name:?}"))
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<eosgw_common::Error> for S3Error {
    fn from(err: eosgw_common::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        let cases = [
            (S3Error::AccessDenied, "AccessDenied", 403),
            (S3Error::NoSuchKey("k".into()), "NoSuchKey", 404),
            (S3Error::BucketNotEmpty("b".into()), "BucketNotEmpty", 409),
            (S3Error::InvalidQueryParams("x".into()), "InvalidArgument", 400),
            (S3Error::NotImplemented("PutBucketCors"), "NotImplemented", 501),
            (S3Error::Internal("x".into()), "InternalError", 500),
        ];
        for (err, code, status) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.status_code(), status);
        }
    }

    #[test]
    fn test_from_client_error() {
        assert!(matches!(S3Error::from(ClientError::Cancelled), S3Error::Cancelled));

        let denied = ClientError::Remote {
            code: 13,
            message: "permission denied".into(),
        };
        assert!(matches!(S3Error::from(denied), S3Error::AccessDenied));

        let other = ClientError::Remote {
            code: 5,
            message: "io".into(),
        };
        assert!(matches!(S3Error::from(other), S3Error::Internal(_)));
    }

    #[test]
    fn test_from_registry_error() {
        assert!(matches!(
            S3Error::from(RegistryError::NotFound("b".into())),
            S3Error::NoSuchBucket(name) if name == "b"
        ));
        assert!(matches!(
            S3Error::from(RegistryError::AlreadyExists("b".into())),
            S3Error::BucketAlreadyExists(_)
        ));
    }

    #[test]
    fn test_error_xml() {
        let xml = S3Error::NoSuchBucket("photos".into()).to_xml(Some("/photos"));
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Error>"));
        assert!(xml.contains("<Code>NoSuchBucket</Code>"));
        assert!(xml.contains("<Resource>/photos</Resource>"));
    }
}
