//! Metadata client for the EOS namespace gRPC service

use crate::error::{ClientError, Result};
use crate::node::{ListFilters, RemoteNode, normalize_path};
use async_trait::async_trait;
use eosgw_common::{EosConfig, Identity};
use eosgw_proto::rpc::eos_client::EosClient;
use eosgw_proto::rpc::{
    FindRequest, MdId, MdRequest, MdResponse, MdSelection, NsRequest, RoleId, Type, ns_request,
};
use futures::stream::{BoxStream, Stream, StreamExt};
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, instrument};

/// Lazy stream of listing entries. Dropping it cancels the RPC.
pub type NodeStream = BoxStream<'static, Result<RemoteNode>>;

/// Primitive operations on the remote namespace.
///
/// Every call is performed as `who`.
#[async_trait]
pub trait Namespace: Send + Sync {
    /// Metadata of a single entry; [`ClientError::NotFound`] when absent
    async fn stat(&self, who: Identity, path: &str) -> Result<RemoteNode>;

    /// Entries below `dir`, excluding `dir` itself
    async fn list(&self, who: Identity, dir: &str, filters: &ListFilters) -> Result<NodeStream>;

    /// Create a directory; fails if it already exists
    async fn mkdir(&self, who: Identity, path: &str, mode: u32, recursive: bool) -> Result<()>;

    /// Remove an empty directory
    async fn rmdir(&self, who: Identity, path: &str) -> Result<()>;

    /// Remove a file, or a directory tree when `recursive`
    async fn remove(&self, who: Identity, path: &str, recursive: bool) -> Result<()>;
}

/// gRPC implementation of [`Namespace`]
#[derive(Clone)]
pub struct MetaClient {
    client: EosClient<Channel>,
    authkey: String,
}

impl MetaClient {
    /// Create a client for the configured endpoint.
    ///
    /// The connection is established on first use.
    pub fn new(config: &EosConfig) -> Result<Self> {
        let channel = Endpoint::from_shared(config.grpc_url.clone())?.connect_lazy();
        Ok(Self::with_channel(channel, config.authkey.clone()))
    }

    pub fn with_channel(channel: Channel, authkey: impl Into<String>) -> Self {
        Self {
            client: EosClient::new(channel),
            authkey: authkey.into(),
        }
    }

    fn stat_request(&self, who: Identity, path: &str) -> MdRequest {
        MdRequest {
            r#type: Type::Stat as i32,
            id: Some(md_id(path)),
            authkey: self.authkey.clone(),
            role: Some(role(who)),
        }
    }

    fn find_request(&self, who: Identity, dir: &str, filters: &ListFilters) -> FindRequest {
        FindRequest {
            r#type: Type::Listing as i32,
            id: Some(md_id(dir)),
            role: Some(role(who)),
            authkey: self.authkey.clone(),
            maxdepth: filters.wire_depth(),
            selection: filters.wire_regex().map(|regex| MdSelection {
                select: true,
                regexp_filename: regex.into_bytes(),
                ..Default::default()
            }),
        }
    }

    fn ns_request(&self, who: Identity, command: ns_request::Command) -> NsRequest {
        NsRequest {
            authkey: self.authkey.clone(),
            role: Some(role(who)),
            command: Some(command),
        }
    }

    async fn exec(&self, request: NsRequest) -> Result<()> {
        let response = self.client.clone().exec(request).await?.into_inner();
        match response.error {
            Some(error) if error.code != 0 => Err(ClientError::Remote {
                code: error.code,
                message: error.msg,
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Namespace for MetaClient {
    #[instrument(skip(self, who), fields(uid = who.uid, gid = who.gid))]
    async fn stat(&self, who: Identity, path: &str) -> Result<RemoteNode> {
        let request = self.stat_request(who, path);
        let mut stream = match self.client.clone().md(request).await {
            Ok(response) => response.into_inner(),
            Err(status) if is_transport_failure(&status) => return Err(status.into()),
            Err(status) => {
                debug!("stat {} failed: {}", path, status.message());
                return Err(ClientError::not_found(path));
            }
        };

        match stream.message().await {
            Ok(Some(response)) => {
                RemoteNode::from_response(response).ok_or_else(|| ClientError::not_found(path))
            }
            Ok(None) | Err(_) => Err(ClientError::not_found(path)),
        }
    }

    #[instrument(skip(self, who), fields(uid = who.uid, gid = who.gid))]
    async fn list(&self, who: Identity, dir: &str, filters: &ListFilters) -> Result<NodeStream> {
        let request = self.find_request(who, dir, filters);
        let stream = self.client.clone().find(request).await?.into_inner();

        Ok(without_self_entry(stream, dir).boxed())
    }

    #[instrument(skip(self, who), fields(uid = who.uid, gid = who.gid))]
    async fn mkdir(&self, who: Identity, path: &str, mode: u32, recursive: bool) -> Result<()> {
        let command = ns_request::Command::Mkdir(ns_request::MkdirRequest {
            id: Some(md_id(path)),
            recursive,
            mode: i64::from(mode),
        });
        self.exec(self.ns_request(who, command)).await
    }

    #[instrument(skip(self, who), fields(uid = who.uid, gid = who.gid))]
    async fn rmdir(&self, who: Identity, path: &str) -> Result<()> {
        let command = ns_request::Command::Rmdir(ns_request::RmdirRequest {
            id: Some(md_id(path)),
        });
        self.exec(self.ns_request(who, command)).await
    }

    #[instrument(skip(self, who), fields(uid = who.uid, gid = who.gid))]
    async fn remove(&self, who: Identity, path: &str, recursive: bool) -> Result<()> {
        let command = ns_request::Command::Rm(ns_request::RmRequest {
            id: Some(md_id(path)),
            recursive,
            norecycle: false,
        });
        self.exec(self.ns_request(who, command)).await
    }
}

fn md_id(path: &str) -> MdId {
    MdId {
        path: path.as_bytes().to_vec(),
        ..Default::default()
    }
}

const fn role(who: Identity) -> RoleId {
    RoleId {
        uid: who.uid,
        gid: who.gid,
        username: String::new(),
        groupname: String::new(),
    }
}

/// Failures of the channel itself, as opposed to a status about the path
fn is_transport_failure(status: &tonic::Status) -> bool {
    matches!(
        status.code(),
        tonic::Code::Unavailable | tonic::Code::DeadlineExceeded | tonic::Code::Cancelled
    )
}

/// Normalize find responses, dropping the entry for the queried directory.
///
/// The directory is matched by path: a server-side name filter may exclude
/// it from the stream.
fn without_self_entry<S>(
    stream: S,
    dir: &str,
) -> impl Stream<Item = Result<RemoteNode>> + use<S>
where
    S: Stream<Item = std::result::Result<MdResponse, tonic::Status>>,
{
    let dir = normalize_path(dir.as_bytes());
    stream.filter_map(move |item| {
        let entry = match item {
            Ok(response) => RemoteNode::from_response(response)
                .filter(|node| node.path != dir)
                .map(Ok),
            Err(status) => Some(Err(ClientError::Rpc(status))),
        };
        futures::future::ready(entry)
    })
}
