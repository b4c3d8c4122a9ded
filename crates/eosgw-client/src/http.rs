//! Data-plane client: object bytes over the redirecting HTTP endpoint
//!
//! The front door never serves data itself. It answers with a redirect to
//! the node holding (or receiving) the bytes, possibly several times, so
//! both verbs run an explicit redirect loop:
//!
//! - every hop carries the impersonation headers;
//! - an upload starts without a body and attaches the body, with an explicit
//!   `Content-Length`, on the first redirected hop;
//! - the loop ends at the first non-redirect status, which must be 200/201.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use eosgw_common::{EosConfig, Identity};
use futures::stream::{BoxStream, Stream, StreamExt, TryStreamExt};
use reqwest::header::{CONTENT_LENGTH, HeaderMap, HeaderValue, LOCATION};
use reqwest::{Client, Response, StatusCode, Url};
use std::io;
use std::pin::Pin;
use tracing::{debug, instrument};

const HEADER_AUTHORIZATION: &str = "x-gateway-authorization";
const HEADER_FORWARDED_FOR: &str = "x-forwarded-for";
const HEADER_REMOTE_USER: &str = "remote-user";

/// Downloaded object bytes
pub type DownloadStream = BoxStream<'static, io::Result<Bytes>>;

/// Object bytes to upload
pub type UploadStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// An object being downloaded
pub struct Download {
    pub stream: DownloadStream,
    /// Declared length, if the data node sent one
    pub content_length: Option<u64>,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Transfer of object bytes, performed as `who`
#[async_trait]
pub trait DataPlane: Send + Sync {
    async fn download(&self, who: Identity, path: &str) -> Result<Download>;

    /// Upload `length` bytes from `body`; the stream is fully consumed on success
    async fn upload(&self, who: Identity, path: &str, body: UploadStream, length: u64)
    -> Result<()>;
}

/// HTTP implementation of [`DataPlane`]
#[derive(Clone)]
pub struct HttpDataClient {
    http: Client,
    base_url: String,
    headers: HeaderMap,
}

impl HttpDataClient {
    /// Create a client for the configured endpoint
    pub fn new(config: &EosConfig) -> Result<Self> {
        let http = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        let mut headers = HeaderMap::new();
        headers.insert(HEADER_AUTHORIZATION, header_value(&config.authkey)?);
        headers.insert(HEADER_FORWARDED_FOR, header_value(&config.forwarded_for)?);

        Ok(Self {
            http,
            base_url: config.http_url.trim_end_matches('/').to_string(),
            headers,
        })
    }

    /// `<base>/<encoded path>?eos.ruid=<uid>&eos.rgid=<gid>`
    pub fn data_url(&self, who: Identity, path: &str) -> Result<Url> {
        let encoded = path
            .trim_start_matches('/')
            .split('/')
            .map(urlencoding::encode)
            .collect::<Vec<_>>()
            .join("/");
        let raw = format!(
            "{}/{}?eos.ruid={}&eos.rgid={}",
            self.base_url, encoded, who.uid, who.gid
        );
        Url::parse(&raw).map_err(|e| ClientError::InvalidRequest(format!("{raw}: {e}")))
    }

    async fn request_headers(&self, who: Identity) -> Result<HeaderMap> {
        let mut headers = self.headers.clone();
        let username = crate::resolve_username(who).await;
        headers.insert(HEADER_REMOTE_USER, header_value(&username)?);
        Ok(headers)
    }
}

#[async_trait]
impl DataPlane for HttpDataClient {
    #[instrument(skip(self, who), fields(uid = who.uid, gid = who.gid))]
    async fn download(&self, who: Identity, path: &str) -> Result<Download> {
        let headers = self.request_headers(who).await?;
        let mut url = self.data_url(who, path)?;

        loop {
            let response = self.http.get(url.clone()).headers(headers.clone()).send().await?;

            if is_redirect(response.status()) {
                url = redirect_target(&url, &response)?;
                debug!("download redirected to {}", url);
                continue;
            }

            check_terminal(&url, response.status())?;
            let content_length = response.content_length();
            let stream = response.bytes_stream().map_err(io::Error::other).boxed();
            return Ok(Download {
                stream,
                content_length,
            });
        }
    }

    #[instrument(skip(self, who, body), fields(uid = who.uid, gid = who.gid))]
    async fn upload(
        &self,
        who: Identity,
        path: &str,
        body: UploadStream,
        length: u64,
    ) -> Result<()> {
        let headers = self.request_headers(who).await?;
        let mut url = self.data_url(who, path)?;
        let mut pending = Some(body);
        let mut redirected = false;

        loop {
            let mut request = self.http.put(url.clone()).headers(headers.clone());
            if redirected && let Some(stream) = pending.take() {
                request = request
                    .header(CONTENT_LENGTH, length)
                    .body(reqwest::Body::wrap_stream(stream));
            }
            let body_sent = pending.is_none();

            let response = request.send().await?;

            if is_redirect(response.status()) {
                if body_sent {
                    return Err(ClientError::BodyNotReplayable {
                        url: url.to_string(),
                    });
                }
                url = redirect_target(&url, &response)?;
                redirected = true;
                debug!("upload redirected to {}", url);
                continue;
            }

            check_terminal(&url, response.status())?;
            if !body_sent && length != 0 {
                return Err(ClientError::NotTransferred {
                    url: url.to_string(),
                    length,
                });
            }
            return Ok(());
        }
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| ClientError::InvalidRequest(format!("invalid header value {value:?}: {e}")))
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// Resolve the `Location` of a redirect against the current URL
fn redirect_target(current: &Url, response: &Response) -> Result<Url> {
    let missing = || ClientError::MissingLocation {
        url: current.to_string(),
    };
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(missing)?;
    current.join(location).map_err(|_| missing())
}

fn check_terminal(url: &Url, status: StatusCode) -> Result<()> {
    if status == StatusCode::OK || status == StatusCode::CREATED {
        Ok(())
    } else {
        Err(ClientError::UnexpectedStatus {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}
