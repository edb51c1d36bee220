//! Local daemon discovery and its HTTP API.

use crate::config::FetchConfig;
use crate::error::{FetchError, Result};
use crate::limit::BoxedReader;
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::fmt;
use std::io;
use std::path::Path;
use std::time::Duration;
use tokio_util::io::StreamReader;
use tracing::debug;

/// Name of the file in the repository directory holding the API address.
pub const API_FILE: &str = "api";

/// Capability of a running daemon that serves resources by path.
#[async_trait]
pub trait IpfsDaemon: Send + Sync {
    /// Whether the daemon answers at all.
    async fn is_up(&self) -> bool;

    /// Stream the bytes of `path`, e.g. `/ipns/dist.ipfs.io/go-ipfs/versions`.
    async fn cat(&self, path: &str) -> Result<BoxedReader>;
}

/// Address of a local daemon API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Parse the contents of an api file such as `/ip4/127.0.0.1/tcp/5001`.
    pub fn parse_api(contents: &str) -> Result<Self> {
        let malformed = || FetchError::MalformedApi(contents.to_string());

        let parts: Vec<&str> = contents.trim().split('/').collect();
        if parts.len() != 5 || parts[2].is_empty() {
            return Err(malformed());
        }
        let port = parts[4].parse().map_err(|_| malformed())?;

        Ok(Self {
            host: parts[2].to_string(),
            port,
        })
    }

    /// Read the endpoint from the api file inside `ipfs_dir`.
    pub async fn discover(ipfs_dir: &Path) -> Result<Self> {
        let path = ipfs_dir.join(API_FILE);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| FetchError::ApiFile { path, source })?;
        Self::parse_api(&contents)
    }

    /// Host part, without IPv6 brackets.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// `http://` URL of the API.
    pub fn base_url(&self) -> String {
        format!("http://{self}")
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Builder for [`ApiClient`].
#[derive(Default)]
pub struct ApiClientBuilder {
    base: Option<String>,
    client: Option<Client>,
    timeout: Option<Duration>,
}

impl ApiClientBuilder {
    /// Set the API base URL (e.g. `http://127.0.0.1:5001`).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base = Some(url.into());
        self
    }

    /// Use the address of a discovered endpoint.
    pub fn endpoint(self, endpoint: &Endpoint) -> Self {
        self.base_url(endpoint.base_url())
    }

    /// Provide a custom reqwest client instance.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Timeout of the liveness check.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ApiClient> {
        let raw = self
            .base
            .unwrap_or_else(|| crate::config::DEFAULT_LOCAL_API_URL.to_string());
        let base = Url::parse(&raw).map_err(|err| FetchError::InvalidUrl(format!("{raw}: {err}")))?;

        Ok(ApiClient {
            base,
            client: self.client.unwrap_or_else(Client::new),
            timeout: self
                .timeout
                .unwrap_or(crate::config::DEFAULT_PROBE_TIMEOUT),
        })
    }
}

/// Client of the daemon's `/api/v0` HTTP interface.
#[derive(Clone, Debug)]
pub struct ApiClient {
    base: Url,
    client: Client,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "Message")]
    message: String,
}

impl ApiClient {
    /// Create a new builder.
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    fn command_url(&self, command: &str) -> Result<Url> {
        self.base
            .join(&format!("api/v0/{command}"))
            .map_err(|err| FetchError::InvalidUrl(format!("{}: {err}", self.base)))
    }
}

#[async_trait]
impl IpfsDaemon for ApiClient {
    async fn is_up(&self) -> bool {
        let Ok(url) = self.command_url("version") else {
            return false;
        };
        match self.client.post(url).timeout(self.timeout).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!("daemon at {} is not reachable: {}", self.base, err);
                false
            }
        }
    }

    async fn cat(&self, path: &str) -> Result<BoxedReader> {
        let url = self.command_url("cat")?;
        let response = self
            .client
            .post(url)
            .query(&[("arg", path)])
            .send()
            .await
            .map_err(|err| FetchError::Daemon(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|err| err.message)
                .unwrap_or(body);
            return Err(FetchError::Daemon(format!("{status}: {message}")));
        }

        let body = response.bytes_stream().map_err(io::Error::other);
        Ok(Box::new(StreamReader::new(Box::pin(body))))
    }
}

/// Whether a daemon answers on the fixed local API URL of `config`.
pub async fn has_daemon_running(config: &FetchConfig) -> bool {
    match ApiClient::builder()
        .base_url(config.local_api_url.clone())
        .timeout(config.probe_timeout)
        .build()
    {
        Ok(client) => client.is_up().await,
        Err(_) => false,
    }
}
