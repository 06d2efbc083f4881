//! Tahoe-LAFS gateway driver.
//!
//! Every operation is a single request/response exchange against the
//! directory capability the backend was configured with. Uploads and
//! downloads stream through the request/response body; payloads are never
//! materialized in memory.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::StreamReader;
use url::Url;

use super::listing::decode_listing;
use super::trust::TrustPolicy;
use crate::backend::{Backend, Entry};
use crate::error::{BackendError, Result};

/// Required prefix of the configured address path: the directory capability.
const DIRCAP_PREFIX: &str = "/uri/URI:DIR2:";

/// Read size of the upload pump.
const COPY_BUFFER: usize = 64 * 1024;

const USER_AGENT: &str = concat!("tahoe-backend/", env!("CARGO_PKG_VERSION"));

/// Tahoe-LAFS backend configuration.
///
/// Keys match the host's string-keyed options mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TahoeConfig {
    /// Gateway address; the path must start with `/uri/URI:DIR2:<capability>`
    /// and carry no query. The address scheme is ignored in favor of
    /// `use-ssl`.
    pub address: String,
    /// Connect over https.
    #[serde(rename = "use-ssl", default)]
    pub use_ssl: bool,
    /// Disable all TLS certificate checks.
    #[serde(rename = "accept-any-ssl-certificate", default)]
    pub accept_any_ssl_certificate: bool,
    /// Accept exactly one certificate by hex fingerprint (SHA-1 or SHA-256).
    #[serde(
        rename = "accept-specified-ssl-hash",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub accept_specified_ssl_hash: Option<String>,
}

/// Tahoe-LAFS storage backend.
///
/// Holds only immutable configuration; a shared instance is safe to call
/// from concurrent tasks.
#[derive(Debug)]
pub struct TahoeBackend {
    base_url: String,
    client: Client,
}

impl TahoeBackend {
    pub fn new(config: TahoeConfig) -> Result<Self> {
        let base_url = resolve_base_url(&config.address, config.use_ssl)?;
        let policy = TrustPolicy::from_options(
            config.use_ssl,
            config.accept_any_ssl_certificate,
            config.accept_specified_ssl_hash.as_deref(),
        )?;

        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("close"));

        // No request timeout: large transfers must not be killed by a
        // deadline. Only the connect phase is bounded.
        let builder = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .pool_max_idle_per_host(0)
            .connect_timeout(Duration::from_secs(30));

        let client = policy.apply(builder).build().map_err(|e| {
            BackendError::Configuration(format!("failed to build HTTP client: {}", e))
        })?;

        Ok(Self { base_url, client })
    }

    /// Request URL for a child name and query string. An empty name
    /// addresses the directory root itself.
    fn build_url(&self, remote_name: &str, query: &str) -> String {
        let mut url = format!("{}{}", self.base_url, urlencoding::encode(remote_name));
        if !query.trim().is_empty() {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    /// Send a request and classify the response status.
    ///
    /// 404 and 409 mean the directory behind the capability is missing or
    /// not listable as a directory; everything else non-2xx is a transport
    /// failure. The status range is checked explicitly rather than relying
    /// on the HTTP stack to flag it.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;

        let status = response.status();
        if (200..300).contains(&status.as_u16()) {
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .ok()
            .filter(|body| !body.trim().is_empty())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });

        if status == StatusCode::NOT_FOUND || status == StatusCode::CONFLICT {
            return Err(BackendError::FolderMissing {
                url: self.base_url.clone(),
                message,
            });
        }

        Err(BackendError::Transport {
            status: Some(status.as_u16()),
            message,
        })
    }
}

/// Validate the configured address and derive the effective base URL.
///
/// The address path must carry the directory capability and no query; the
/// literal scheme is discarded in favor of `use-ssl`, and a trailing slash
/// is guaranteed. No network I/O happens here.
fn resolve_base_url(address: &str, use_ssl: bool) -> Result<String> {
    let parsed = Url::parse(address)
        .map_err(|e| BackendError::Configuration(format!("invalid address {:?}: {}", address, e)))?;

    if !parsed.path().starts_with(DIRCAP_PREFIX) {
        return Err(BackendError::Configuration(format!(
            "unrecognized address {:?}, path must start with {}",
            address, DIRCAP_PREFIX
        )));
    }

    if parsed.query().map_or(false, |q| !q.is_empty()) {
        return Err(BackendError::Configuration(format!(
            "address {:?} must not contain a query",
            address
        )));
    }

    let scheme = if use_ssl { "https" } else { "http" };
    // Keep everything after the original scheme verbatim.
    let rest = address
        .split_once(':')
        .map(|(_, rest)| rest)
        .unwrap_or(address);
    let mut base = format!("{}:{}", scheme, rest);
    if !base.ends_with('/') {
        base.push('/');
    }
    Ok(base)
}

#[async_trait]
impl Backend for TahoeBackend {
    fn protocol(&self) -> &'static str {
        "tahoe"
    }

    fn display_name(&self) -> &'static str {
        "Tahoe-LAFS"
    }

    async fn test(&self) -> Result<()> {
        self.list().await.map(|_| ())
    }

    async fn list(&self) -> Result<Vec<Entry>> {
        let url = self.build_url("", "t=json");
        tracing::debug!("Tahoe GET: {}", url);

        let response = self.execute(self.client.get(&url)).await?;
        let body = response.bytes().await?;
        decode_listing(&body)
    }

    async fn create_folder(&self) -> Result<()> {
        let url = self.build_url("", "t=mkdir");
        tracing::debug!("Tahoe POST: {}", url);

        self.execute(self.client.post(&url)).await?;
        Ok(())
    }

    async fn put(
        &self,
        name: &str,
        mut source: Box<dyn AsyncRead + Send + Unpin>,
        size_hint: Option<u64>,
    ) -> Result<()> {
        let url = self.build_url(name, "");
        tracing::debug!("Tahoe PUT: {} (size: {:?})", url, size_hint);

        // Pump the caller's reader through a channel so the request body
        // streams instead of materializing the payload.
        let (tx, rx) = tokio::sync::mpsc::channel::<std::io::Result<Bytes>>(16);
        let pump = tokio::spawn(async move {
            let mut buf = vec![0u8; COPY_BUFFER];
            loop {
                match source.read(&mut buf).await {
                    Ok(0) => return Ok(()),
                    Ok(n) => {
                        if tx.send(Ok(Bytes::copy_from_slice(&buf[..n]))).await.is_err() {
                            // Request side hung up; its error is the one to surface.
                            return Ok(());
                        }
                    }
                    Err(e) => {
                        let kind = e.kind();
                        let message = e.to_string();
                        let _ = tx.send(Err(e)).await;
                        return Err(std::io::Error::new(kind, message));
                    }
                }
            }
        });

        let mut request = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, "application/binary")
            .body(reqwest::Body::wrap_stream(ReceiverStream::new(rx)));
        if let Some(length) = size_hint {
            request = request.header(CONTENT_LENGTH, length);
        }

        let outcome = self.execute(request).await;

        match pump.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(e) => {
                return Err(BackendError::Transport {
                    status: None,
                    message: format!("upload task failed: {}", e),
                })
            }
        }

        outcome.map(|_| ())
    }

    async fn get(&self, name: &str, dest: &mut (dyn AsyncWrite + Send + Unpin)) -> Result<u64> {
        let url = self.build_url(name, "");
        tracing::debug!("Tahoe GET: {}", url);

        let response = self.execute(self.client.get(&url)).await?;
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)));
        let mut reader = StreamReader::new(stream);
        let copied = tokio::io::copy(&mut reader, dest).await?;
        Ok(copied)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let url = self.build_url(name, "");
        tracing::debug!("Tahoe DELETE: {}", url);

        self.execute(self.client.delete(&url)).await?;
        Ok(())
    }
}
