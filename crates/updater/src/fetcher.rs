use crate::config::FetchConfig;
use crate::daemon::{ApiClient, Endpoint, IpfsDaemon};
use crate::error::{FetchError, Result};
use crate::limit::{BoxedReader, FetchStream, SizeLimitedStream};
use crate::progress::{ProgressOutcome, ProgressReporter, ProgressSink, TerminalProgress};
use futures::TryStreamExt;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, Url};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncWriteExt, ReadBuf};
use tokio_util::io::StreamReader;
use tracing::{debug, error, warn};

/// Fetches resources from a local daemon when one answers, and from the HTTP
/// gateway otherwise.
#[derive(Clone)]
pub struct TransportFetcher {
    config: FetchConfig,
    client: Client,
    progress: Arc<dyn ProgressSink>,
}

impl TransportFetcher {
    /// Create a fetcher that reports gateway progress on the terminal.
    pub fn new(config: FetchConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    /// Create a fetcher on top of a custom reqwest client instance.
    pub fn with_client(config: FetchConfig, client: Client) -> Self {
        Self {
            config,
            client,
            progress: Arc::new(TerminalProgress),
        }
    }

    /// Send gateway progress to `sink` instead of the terminal.
    pub fn progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    /// Configuration the fetcher was built with.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch `path`, discovering the local daemon from the repository
    /// directory. Discovery failures silently fall back to the gateway.
    pub async fn fetch(&self, path: &str) -> Result<FetchStream> {
        debug!("  - fetching {:?}", path);
        let daemon = self.discover_daemon().await;
        self.fetch_via(daemon.as_ref().map(|d| d as &dyn IpfsDaemon), path)
            .await
    }

    /// Fetch `path` through `daemon` if it is up, otherwise through the gateway.
    pub async fn fetch_via(
        &self,
        daemon: Option<&dyn IpfsDaemon>,
        path: &str,
    ) -> Result<FetchStream> {
        if let Some(daemon) = daemon {
            if daemon.is_up().await {
                debug!("  - using local ipfs daemon for transfer");
                let reader = daemon.cat(path).await?;
                return Ok(SizeLimitedStream::new(reader, self.config.size_limit));
            }
            debug!("  - local daemon is not responding");
        }

        self.fetch_gateway(path).await
    }

    async fn discover_daemon(&self) -> Option<ApiClient> {
        let endpoint = match Endpoint::discover(&self.config.ipfs_dir).await {
            Ok(endpoint) => endpoint,
            Err(err) => {
                debug!("  - no local daemon: {}", err);
                return None;
            }
        };

        match ApiClient::builder()
            .endpoint(&endpoint)
            .client(self.client.clone())
            .timeout(self.config.probe_timeout)
            .build()
        {
            Ok(client) => Some(client),
            Err(err) => {
                debug!("  - unusable daemon endpoint {}: {}", endpoint, err);
                None
            }
        }
    }

    async fn fetch_gateway(&self, path: &str) -> Result<FetchStream> {
        let raw = self.config.gateway_resource_url(path);
        let url =
            Url::parse(&raw).map_err(|err| FetchError::InvalidUrl(format!("{raw}: {err}")))?;
        debug!("fetching url: {}", url);

        let expected = self.content_length(url.clone()).await?;

        let temp = tempfile::Builder::new()
            .prefix("ipfs")
            .tempfile()
            .map_err(FetchError::TempFile)?;

        // Dropping the handle on an early return stops the reporter.
        let progress = expected.map(|total| {
            ProgressReporter::new(temp.path(), total, self.progress.clone())
                .interval(self.config.progress_interval)
                .spawn()
        });

        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(FetchError::Request)?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            error!("fetching resource: {}", status);
            if let Some(progress) = progress {
                progress.cancel().await;
            }
            let body = response.text().await.map_err(FetchError::Request)?;
            return Err(FetchError::Status { status, body });
        }

        let mut out = tokio::fs::File::from_std(temp.reopen().map_err(FetchError::TempFile)?);
        let mut body = StreamReader::new(Box::pin(
            response.bytes_stream().map_err(io::Error::other),
        ));
        let written = tokio::io::copy(&mut body, &mut out)
            .await
            .map_err(FetchError::Copy)?;
        out.flush().await.map_err(FetchError::Copy)?;
        drop(out);

        if let Some(progress) = progress {
            if let ProgressOutcome::Unreadable(err) = progress.finish(written).await {
                warn!("progress reporting stopped early: {}", err);
            }
        }
        debug!("downloaded {} bytes to {:?}", written, temp.path());

        let file = tokio::fs::File::from_std(temp.reopen().map_err(FetchError::TempFile)?);
        let download: BoxedReader = Box::new(DownloadedFile {
            file,
            _path: temp.into_temp_path(),
        });
        Ok(SizeLimitedStream::new(download, self.config.size_limit))
    }

    /// Size of the resource according to a HEAD request. `None` when the
    /// gateway answers the HEAD with an error status; the GET reports it.
    async fn content_length(&self, url: Url) -> Result<Option<u64>> {
        let response = self
            .request(Method::HEAD, url)
            .send()
            .await
            .map_err(FetchError::Metadata)?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            warn!("HEAD request answered with {}", status);
            return Ok(None);
        }
        parse_content_length(response.headers()).map(Some)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(USER_AGENT, self.config.user_agent.as_str())
    }
}

fn parse_content_length(headers: &HeaderMap) -> Result<u64> {
    let value = headers
        .get(CONTENT_LENGTH)
        .ok_or_else(|| FetchError::ContentLength("header missing".into()))?;
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| FetchError::ContentLength(format!("invalid value {value:?}")))
}

/// Finished download, removed from disk once dropped.
struct DownloadedFile {
    file: tokio::fs::File,
    _path: TempPath,
}

impl AsyncRead for DownloadedFile {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_read(cx, buf)
    }
}

/// Fetch `path` with a one-off [`TransportFetcher`] built from `config`.
///
/// The caller owns the returned stream and releases it by closing or
/// dropping it.
pub async fn fetch(config: &FetchConfig, path: &str) -> Result<FetchStream> {
    TransportFetcher::new(config.clone()).fetch(path).await
}
