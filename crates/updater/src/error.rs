use std::path::PathBuf;

/// Convenient result alias for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;

/// Errors that can occur while locating or fetching a resource.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// The daemon API file could not be read.
    #[error("reading daemon api file {path:?} failed: {source}")]
    ApiFile {
        /// Location of the api file.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// The daemon API file did not hold a `/ipN/<host>/tcp/<port>` address.
    #[error("incorrectly formatted api string: {0:?}")]
    MalformedApi(String),
    /// The HEAD request used to size the transfer failed.
    #[error("http HEAD request failed: {0}")]
    Metadata(#[source] reqwest::Error),
    /// The HEAD response carried no usable `Content-Length`.
    #[error("http HEAD Content-Length error: {0}")]
    ContentLength(String),
    /// The GET request to the gateway could not be completed.
    #[error("gateway request failed: {0}")]
    Request(#[source] reqwest::Error),
    /// The gateway answered with an error status.
    #[error("{status}: {body}")]
    Status {
        /// HTTP status line returned by the gateway.
        status: reqwest::StatusCode,
        /// Response body, kept as error context.
        body: String,
    },
    /// The temporary download file could not be created or reopened.
    #[error("temporary file error: {0}")]
    TempFile(#[source] std::io::Error),
    /// Copying the response body to disk failed.
    #[error("error writing temp file to disk: {0}")]
    Copy(#[source] std::io::Error),
    /// The local daemon refused or failed the `cat` request.
    #[error("local daemon transfer failed: {0}")]
    Daemon(String),
    /// An external command could not be started.
    #[error("failed to run {command}: {source}")]
    Spawn {
        /// Program that was executed.
        command: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// An external command exited unsuccessfully.
    #[error("{status}: {output}")]
    Command {
        /// Exit status of the command.
        status: std::process::ExitStatus,
        /// Combined stdout and stderr.
        output: String,
    },
    /// A configured URL could not be combined with a resource path.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Whether the error arose while transferring a resource, as opposed to
    /// discovering the daemon or running a command.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FetchError::Metadata(_)
                | FetchError::ContentLength(_)
                | FetchError::Request(_)
                | FetchError::Status { .. }
                | FetchError::TempFile(_)
                | FetchError::Copy(_)
                | FetchError::Daemon(_)
        )
    }

    /// Whether the error came from daemon discovery.
    pub fn is_discovery(&self) -> bool {
        matches!(self, FetchError::ApiFile { .. } | FetchError::MalformedApi(_))
    }
}
