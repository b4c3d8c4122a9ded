//! eosgw Client - Remote namespace clients
//!
//! This crate provides the two channels to the remote namespace:
//! - [`meta`]: metadata operations over gRPC (stat, list, mkdir, rmdir, remove)
//! - [`http`]: object bytes over the redirecting HTTP data endpoint
//!
//! Both are exposed behind traits ([`Namespace`], [`DataPlane`]) so callers
//! can run against any implementation.

pub mod error;
pub mod http;
pub mod meta;
pub mod node;

pub use error::{ClientError, Result};
pub use http::{DataPlane, Download, DownloadStream, HttpDataClient, UploadStream};
pub use meta::{MetaClient, Namespace, NodeStream};
pub use node::{ListFilters, NodeKind, RemoteNode};

use eosgw_common::Identity;
use eosgw_common::types::UNKNOWN_USER;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Race `fut` against `cancel`.
///
/// Returns [`ClientError::Cancelled`] if the token fires first; the
/// in-flight call is dropped.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ClientError::Cancelled),
        result = fut => result,
    }
}

/// Username of `who`, looked up on the blocking pool.
///
/// The user database may be backed by NSS/LDAP and block.
pub async fn resolve_username(who: Identity) -> String {
    tokio::task::spawn_blocking(move || who.username())
        .await
        .unwrap_or_else(|_| UNKNOWN_USER.to_string())
}
