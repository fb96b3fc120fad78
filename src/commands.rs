use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::watch;
use tracing::info;

use fetchpkg::{FileBrowser, HttpConfig, HttpTransport, TransferController, TransferSnapshot};

use crate::cli::OutputMode;

const BAR_SCALE: u64 = 1000;

pub struct DownloadOptions {
    pub url: String,
    pub download_dir: PathBuf,
    pub rate_limit: Option<u32>,
    pub connect_timeout: u64,
    pub sha256: Option<String>,
    pub output: OutputMode,
    pub reveal: bool,
}

pub async fn run_single_download(options: DownloadOptions) -> Result<()> {
    if !options.download_dir.exists() {
        fs::create_dir_all(&options.download_dir)
            .await
            .context("Failed to create download directory")?;
    }

    let mut config = HttpConfig::new(&options.download_dir);
    config.connect_timeout = Duration::from_secs(options.connect_timeout);
    config.rate_limit = options.rate_limit;
    config.expected_sha256 = options.sha256.clone();
    let transport = HttpTransport::new(config).context("Failed to build HTTP client")?;

    let mut controller = TransferController::new(
        Box::new(transport),
        Arc::new(FileBrowser),
        options.download_dir.clone(),
    );
    let view = tokio::spawn(render(controller.subscribe(), options.output));

    controller.start(Some(&options.url));
    if controller.current_transfer().is_none() {
        bail!("Invalid URL: {}", options.url);
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome = loop {
        tokio::select! {
            event = controller.recv() => match event {
                Some(event) => controller.handle_event(event),
                None => break controller.snapshot(),
            },
            _ = &mut ctrl_c => {
                info!("Interrupted");
                controller.cancel();
                break controller.snapshot();
            }
        }
        if !controller.snapshot().is_active {
            break controller.snapshot();
        }
    };

    if options.reveal {
        controller.reveal_completed_artifact();
    }
    // Dropping the controller closes the watch channel and ends the view.
    drop(controller);
    let _ = view.await;

    report(&outcome, options.output)
}

fn report(outcome: &TransferSnapshot, output: OutputMode) -> Result<()> {
    if let Some(path) = &outcome.local_path {
        if output != OutputMode::Json {
            println!("{}", path.display());
        }
        return Ok(());
    }
    match &outcome.error {
        Some(reason) => bail!("Download failed: {}", reason),
        None => bail!("Download cancelled"),
    }
}

async fn render(mut rx: watch::Receiver<TransferSnapshot>, output: OutputMode) {
    match output {
        OutputMode::Quiet => while rx.changed().await.is_ok() {},
        OutputMode::Json => {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                if let Ok(line) = serde_json::to_string(&snapshot) {
                    println!("{}", line);
                }
            }
        }
        OutputMode::Progress => {
            let pb = ProgressBar::with_draw_target(
                Some(BAR_SCALE),
                ProgressDrawTarget::stderr_with_hz(5),
            );
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=>-"),
            );

            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                if snapshot.fraction_complete.is_finite() {
                    let fraction = snapshot.fraction_complete.clamp(0.0, 1.0);
                    pb.set_position((fraction * BAR_SCALE as f64) as u64);
                }
                pb.set_message(snapshot.progress_label.clone());

                if snapshot.is_complete {
                    let name = snapshot
                        .local_path
                        .as_ref()
                        .and_then(|path| path.file_name())
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    pb.finish_with_message(format!("Completed   {}", name));
                } else if let Some(reason) = &snapshot.error {
                    pb.abandon_with_message(format!("Failed      {}", reason));
                } else if !snapshot.is_active {
                    pb.abandon_with_message("Cancelled");
                }
            }
        }
    }
}
