//! Configuration for resource fetching.

use crate::limit::DEFAULT_SIZE_LIMIT;
use crate::progress::DEFAULT_PROGRESS_INTERVAL;
use std::path::PathBuf;
use std::time::Duration;

/// Public gateway used when no local daemon answers.
pub const DEFAULT_GATEWAY_URL: &str = "https://ipfs.io";
/// API address of a daemon running with default settings.
pub const DEFAULT_LOCAL_API_URL: &str = "http://localhost:5001";
/// IPNS path of the distribution index.
pub const DEFAULT_DIST_PATH: &str = "/ipns/dist.ipfs.io";
/// Timeout of the daemon liveness check.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);
/// `User-Agent` sent with gateway requests.
pub const USER_AGENT: &str = concat!("ipfs-update/", env!("CARGO_PKG_VERSION"));

/// Overrides the distribution index path.
pub const DIST_PATH_ENV: &str = "IPFS_DIST_PATH";
/// Overrides the daemon repository directory.
pub const IPFS_PATH_ENV: &str = "IPFS_PATH";
/// Home directory used to derive the default repository directory.
pub const HOME_ENV: &str = "HOME";

/// Settings shared by every fetch. Built once at startup.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Base URL of the HTTP gateway; resource paths are appended verbatim.
    pub gateway_url: String,
    /// Fixed daemon API address used by [`crate::has_daemon_running`].
    pub local_api_url: String,
    /// Path of the distribution index.
    pub dist_path: String,
    /// Daemon repository directory holding the `api` file.
    pub ipfs_dir: PathBuf,
    /// Maximum number of payload bytes handed to the caller.
    pub size_limit: u64,
    /// Timeout of the daemon liveness check.
    pub probe_timeout: Duration,
    /// Interval between progress samples.
    pub progress_interval: Duration,
    /// `User-Agent` header of gateway requests.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            local_api_url: DEFAULT_LOCAL_API_URL.to_string(),
            dist_path: DEFAULT_DIST_PATH.to_string(),
            ipfs_dir: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".ipfs"),
            size_limit: DEFAULT_SIZE_LIMIT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    /// Build a config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup. Empty values are
    /// treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let mut config = Self::default();

        if let Some(dist) = var(DIST_PATH_ENV) {
            config.dist_path = dist;
        }

        if let Some(path) = var(IPFS_PATH_ENV) {
            config.ipfs_dir = PathBuf::from(path);
        } else if let Some(home) = var(HOME_ENV) {
            config.ipfs_dir = PathBuf::from(home).join(".ipfs");
        }

        config
    }

    /// Set the gateway base URL
    pub fn gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = url.into();
        self
    }

    /// Set the fixed daemon API URL
    pub fn local_api_url(mut self, url: impl Into<String>) -> Self {
        self.local_api_url = url.into();
        self
    }

    /// Set the distribution index path
    pub fn dist_path(mut self, path: impl Into<String>) -> Self {
        self.dist_path = path.into();
        self
    }

    /// Set the daemon repository directory
    pub fn ipfs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ipfs_dir = dir.into();
        self
    }

    /// Set the payload size ceiling
    pub fn size_limit(mut self, limit: u64) -> Self {
        self.size_limit = limit;
        self
    }

    /// Set the daemon liveness timeout
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the progress sampling interval
    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Resolve a path relative to the distribution index, e.g.
    /// `go-ipfs/versions` becomes `/ipns/dist.ipfs.io/go-ipfs/versions`.
    pub fn dist_resource(&self, relative: &str) -> String {
        format!(
            "{}/{}",
            self.dist_path.trim_end_matches('/'),
            relative.trim_start_matches('/')
        )
    }

    /// Gateway URL serving `resource`.
    pub fn gateway_resource_url(&self, resource: &str) -> String {
        let base = self.gateway_url.trim_end_matches('/');
        if resource.starts_with('/') {
            format!("{base}{resource}")
        } else {
            format!("{base}/{resource}")
        }
    }
}
