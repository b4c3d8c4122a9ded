//! Client error types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;

/// errno values the remote reports for permission failures
const EPERM: i64 = 1;
const ENOENT: i64 = 2;
const EACCES: i64 = 13;

/// Errors returned by the metadata and data-plane clients
#[derive(Error, Debug)]
pub enum ClientError {
    /// gRPC call failed
    #[error("gRPC error: {0}")]
    Rpc(#[from] tonic::Status),

    /// gRPC channel could not be set up
    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The path does not exist (or could not be stat'ed)
    #[error("no such resource: {path}")]
    NotFound { path: String },

    /// The remote executed the request and reported a failure
    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The data endpoint answered with a status other than 200/201
    #[error("got non OK status code from {url}: {status}")]
    UnexpectedStatus { url: String, status: u16 },

    /// A redirect carried no usable `Location` header
    #[error("redirect from {url} has no valid Location header")]
    MissingLocation { url: String },

    /// A redirect arrived after the upload body was already sent
    #[error("redirected by {url} after the upload body was sent")]
    BodyNotReplayable { url: String },

    /// The front door accepted a non-empty upload without a redirect
    #[error("{url} accepted the upload without receiving {length} bytes")]
    NotTransferred { url: String, length: u64 },

    /// Invalid data URL or header value
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request was cancelled by the caller
    #[error("request cancelled")]
    Cancelled,
}

impl ClientError {
    /// Create a not-found error for `path`
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Check if this is a "not found" error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Remote { code, .. } => code.abs() == ENOENT,
            _ => false,
        }
    }

    /// Check if the remote refused the operation for lack of permission
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::Remote { code, .. } => matches!(code.abs(), EPERM | EACCES),
            Self::Rpc(status) => status.code() == tonic::Code::PermissionDenied,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(ClientError::not_found("/eos/x").is_not_found());
        assert!(ClientError::Remote { code: 2, message: String::new() }.is_not_found());

        let denied = ClientError::Remote {
            code: -13,
            message: "permission denied".to_string(),
        };
        assert!(denied.is_permission_denied());
        assert!(!denied.is_not_found());

        assert!(ClientError::Rpc(tonic::Status::permission_denied("no")).is_permission_denied());
        assert!(!ClientError::Cancelled.is_permission_denied());
    }

    #[test]
    fn test_display() {
        let err = ClientError::UnexpectedStatus {
            url: "http://eos/x".to_string(),
            status: 500,
        };
        assert_eq!(err.to_string(), "got non OK status code from http://eos/x: 500");
    }
}
