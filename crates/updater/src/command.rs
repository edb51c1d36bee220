//! Running external binaries against a daemon repository.

use crate::config::IPFS_PATH_ENV;
use crate::error::{FetchError, Result};
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Run `bin` with `args`, pointing it at the repository in `ipfs_dir`.
///
/// Returns stdout followed by stderr with one trailing newline removed. A
/// non-zero exit becomes [`FetchError::Command`] carrying that same output.
pub async fn run_cmd<I, S>(ipfs_dir: &Path, bin: impl AsRef<OsStr>, args: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = bin.as_ref();
    debug!("running {:?} with {}={:?}", bin, IPFS_PATH_ENV, ipfs_dir);

    let output = Command::new(bin)
        .args(args)
        .env(IPFS_PATH_ENV, ipfs_dir)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| FetchError::Spawn {
            command: bin.to_string_lossy().into_owned(),
            source,
        })?;

    let mut combined = output.stdout;
    combined.extend_from_slice(&output.stderr);
    let mut text = String::from_utf8_lossy(&combined).into_owned();

    if !output.status.success() {
        return Err(FetchError::Command {
            status: output.status,
            output: text,
        });
    }

    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}
