mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::cli::OutputMode;
use crate::commands::DownloadOptions;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL to download
    #[arg(index = 1)]
    url: String,

    /// Directory to save the download into (defaults to the user's downloads folder)
    #[arg(short = 'd', long = "download-dir", env = "FETCHPKG_DOWNLOAD_DIR")]
    download_dir: Option<PathBuf>,

    /// Rate limit in bytes per second (e.g., 1048576 for 1MB/s)
    #[arg(short = 'r', long, env = "FETCHPKG_RATE_LIMIT")]
    rate_limit: Option<u32>,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = 10, env = "FETCHPKG_CONNECT_TIMEOUT")]
    connect_timeout: u64,

    /// Expected SHA-256 of the download (hex)
    #[arg(long)]
    sha256: Option<String>,

    /// How to report progress
    #[arg(short = 'o', long, value_enum, default_value = "progress")]
    output: OutputMode,

    /// Show the finished download in the file browser
    #[arg(long)]
    reveal: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fetchpkg=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut download_dir = args.download_dir.unwrap_or_else(fetchpkg::utils::downloads_dir);
    // Relative paths are taken from the working directory
    if download_dir.is_relative() {
        if let Ok(cwd) = std::env::current_dir() {
            download_dir = cwd.join(&download_dir);
        }
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(commands::run_single_download(DownloadOptions {
        url: args.url,
        download_dir,
        rate_limit: args.rate_limit,
        connect_timeout: args.connect_timeout,
        sha256: args.sha256,
        output: args.output,
        reveal: args.reveal,
    }))
}
