//! Per-request context supplied by the hosting gateway

use crate::error::{Result, S3Error};
use eosgw_common::Identity;
use tokio_util::sync::CancellationToken;

/// Caller identity and cancellation for one request
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    /// Authenticated caller, if any
    pub identity: Option<Identity>,
    /// Caller has administrative rights
    pub is_admin: bool,
    /// Fired when the request is abandoned
    pub cancel: CancellationToken,
}

impl RequestContext {
    /// Context for an authenticated caller
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            ..Self::default()
        }
    }

    /// Context without an authenticated caller
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The identity to impersonate; `AccessDenied` when absent
    pub fn identity(&self) -> Result<Identity> {
        self.identity.ok_or(S3Error::AccessDenied)
    }
}
