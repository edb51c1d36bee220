//! Fetching of IPFS distribution resources for self-updates.
//!
//! Resources such as the `versions` index or a release archive are addressed
//! by an IPFS path. A fetch prefers a daemon running on this machine, found
//! through the `api` file of its repository, and falls back to a public HTTP
//! gateway when no daemon answers. Gateway downloads report their progress
//! and every payload is capped at [`DEFAULT_SIZE_LIMIT`] bytes.
//!
//! ```ignore
//! use ipfs_update::{is_older, FetchConfig, TransportFetcher};
//! use tokio::io::AsyncReadExt;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = FetchConfig::from_env();
//! let fetcher = TransportFetcher::new(config.clone());
//!
//! let mut stream = fetcher.fetch(&config.dist_resource("go-ipfs/versions")).await?;
//! let mut versions = String::new();
//! stream.read_to_string(&mut versions).await?;
//!
//! let latest = versions.lines().last().unwrap_or_default();
//! if is_older("v0.4.21", latest) {
//!     println!("update available: {latest}");
//! }
//! # Ok(())
//! # }
//! ```

mod command;
mod config;
mod daemon;
mod error;
mod fetcher;
mod limit;
mod progress;
mod version;

pub use command::run_cmd;
pub use config::{
    FetchConfig, DEFAULT_DIST_PATH, DEFAULT_GATEWAY_URL, DEFAULT_LOCAL_API_URL,
    DEFAULT_PROBE_TIMEOUT, USER_AGENT,
};
pub use daemon::{has_daemon_running, ApiClient, ApiClientBuilder, Endpoint, IpfsDaemon, API_FILE};
pub use error::{FetchError, Result};
pub use fetcher::{fetch, TransportFetcher};
pub use limit::{BoxedReader, FetchStream, SizeLimitedStream, DEFAULT_SIZE_LIMIT};
pub use progress::{
    NoProgress, ProgressHandle, ProgressOutcome, ProgressReporter, ProgressSink,
    TerminalProgress, DEFAULT_PROGRESS_INTERVAL,
};
pub use version::{is_older, InvalidVersion, Version};
