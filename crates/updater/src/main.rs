use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ipfs_update::{has_daemon_running, is_older, FetchConfig, TransportFetcher};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(author, version, about = "Fetch IPFS distribution resources", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a resource by IPFS path and write it to stdout or a file
    Fetch {
        /// IPFS path, e.g. /ipns/dist.ipfs.io/go-ipfs/versions
        path: String,
        /// Treat PATH as relative to the distribution index
        #[arg(long)]
        dist: bool,
        /// Write the payload to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Report whether a daemon answers on the local API address
    Daemon,
    /// Print whether CANDIDATE is older than CURRENT (e.g. v0.4.21 v0.4.22)
    IsOlder {
        /// Version being considered
        candidate: String,
        /// Version currently installed
        current: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Payload goes to stdout, so logs go to stderr
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let config = FetchConfig::from_env();

    match cli.command {
        Commands::Fetch { path, dist, output } => {
            let path = if dist {
                config.dist_resource(&path)
            } else {
                path
            };
            let fetcher = TransportFetcher::new(config);
            let mut stream = fetcher
                .fetch(&path)
                .await
                .with_context(|| format!("fetching {path}"))?;

            let written = match &output {
                Some(file) => {
                    let mut out = tokio::fs::File::create(file)
                        .await
                        .with_context(|| format!("creating {}", file.display()))?;
                    let n = tokio::io::copy(&mut stream, &mut out).await?;
                    out.flush().await?;
                    n
                }
                None => {
                    let mut out = tokio::io::stdout();
                    let n = tokio::io::copy(&mut stream, &mut out).await?;
                    out.flush().await?;
                    n
                }
            };
            stream.close();
            info!("fetched {} bytes from {}", written, path);
        }
        Commands::Daemon => {
            if has_daemon_running(&config).await {
                println!("daemon running at {}", config.local_api_url);
            } else {
                println!("no daemon at {}", config.local_api_url);
            }
        }
        Commands::IsOlder { candidate, current } => {
            println!("{}", is_older(&candidate, &current));
        }
    }

    Ok(())
}
