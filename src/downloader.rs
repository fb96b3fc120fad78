use futures::StreamExt;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{header, Client};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace};
use url::Url;

use crate::error::TransferError;
use crate::hashing::Checksum;
use crate::transport::{FetchRequest, TransferHandle, Transport, TransportEvent};
use crate::utils::suggested_filename;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Where fetched bodies are staged. Must share a filesystem with the
    /// final download directory.
    pub staging_dir: PathBuf,
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Bytes per second across the whole fetch.
    pub rate_limit: Option<u32>,
    /// Hex SHA-256 the body must match.
    pub expected_sha256: Option<String>,
}

impl HttpConfig {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            user_agent: concat!("fetchpkg/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: Duration::from_secs(10),
            rate_limit: None,
            expected_sha256: None,
        }
    }
}

/// Streams a URL into a staged temp file with reqwest.
///
/// Fetches run on the tokio runtime that was current when the transport was
/// built, so `begin` may be called from any thread afterwards.
pub struct HttpTransport {
    runtime: Handle,
    client: Client,
    config: HttpConfig,
    rate_limiter: Option<Arc<Limiter>>,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Result<Self, TransferError> {
        let runtime = Handle::try_current().map_err(|_| TransferError::NoRuntime)?;
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .build()?;

        let rate_limiter = config
            .rate_limit
            .and_then(NonZeroU32::new)
            .map(|limit| Arc::new(RateLimiter::direct(Quota::per_second(limit))));

        Ok(Self {
            runtime,
            client,
            config,
            rate_limiter,
        })
    }
}

impl Transport for HttpTransport {
    fn begin(&self, request: FetchRequest) -> TransferHandle {
        let token = CancellationToken::new();
        let fetch = Fetch {
            client: self.client.clone(),
            staging_dir: self.config.staging_dir.clone(),
            rate_limiter: self.rate_limiter.clone(),
            checksum: self.config.expected_sha256.clone().map(Checksum::new),
        };
        let id = request.id;
        self.runtime.spawn(fetch.run(request, token.clone()));
        TransferHandle::new(id, token)
    }
}

struct Fetch {
    client: Client,
    staging_dir: PathBuf,
    rate_limiter: Option<Arc<Limiter>>,
    checksum: Option<Checksum>,
}

impl Fetch {
    #[instrument(name = "fetch", skip_all, fields(id = %request.id, url = %request.url))]
    async fn run(self, request: FetchRequest, token: CancellationToken) {
        let FetchRequest { id, url, events } = request;

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = self.stream(&url, |written, total| {
                let _ = events.send(TransportEvent::Progress { id, written, total });
            }) => Some(result),
        };

        match outcome {
            None => info!("Fetch cancelled"),
            Some(Ok((content, suggested_filename))) => {
                info!(suggested = ?suggested_filename, "Fetch finished");
                let _ = events.send(TransportEvent::Finished {
                    id,
                    content,
                    suggested_filename,
                });
            }
            Some(Err(e)) => {
                error!(error = %e, "Fetch failed");
                let _ = events.send(TransportEvent::Failed {
                    id,
                    reason: e.to_string(),
                });
            }
        }
    }

    async fn stream(
        mut self,
        url: &Url,
        mut on_progress: impl FnMut(u64, Option<u64>),
    ) -> Result<(TempPath, Option<String>), TransferError> {
        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Status {
                status,
                url: url.to_string(),
            });
        }

        let total = response.content_length();
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        // Redirects may have moved us to a better-named URL.
        let suggested = suggested_filename(disposition.as_deref(), response.url())
            .or_else(|| suggested_filename(None, url));
        debug!(?total, ?suggested, "Response accepted");

        tokio::fs::create_dir_all(&self.staging_dir).await?;
        let staged = tempfile::Builder::new()
            .prefix(".fetchpkg-")
            .suffix(".part")
            .tempfile_in(&self.staging_dir)?;
        let (file, path) = staged.into_parts();
        let mut file = File::from_std(file);

        let mut written: u64 = 0;
        on_progress(written, total);

        let mut body = response.bytes_stream();
        while let Some(item) = body.next().await {
            let chunk = item?;
            if chunk.is_empty() {
                continue;
            }

            if let Some(limiter) = &self.rate_limiter {
                wait_for_quota(limiter, chunk.len()).await;
            }

            file.write_all(&chunk).await?;
            if let Some(checksum) = self.checksum.as_mut() {
                checksum.update(&chunk);
            }

            written += chunk.len() as u64;
            trace!(written, chunk = chunk.len(), "Chunk written");
            on_progress(written, total);
        }

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if let Some(checksum) = self.checksum.take() {
            let digest = checksum.verify()?;
            debug!(sha256 = %digest, "Checksum verified");
        }

        Ok((path, suggested))
    }
}

/// Blocks until the limiter admits `len` bytes, splitting requests larger
/// than the burst size.
async fn wait_for_quota(limiter: &Limiter, len: usize) {
    let mut remaining = len as u64;
    while remaining > 0 {
        let step = remaining.min(u32::MAX as u64) as u32;
        let Some(n) = NonZeroU32::new(step) else {
            return;
        };
        match limiter.until_n_ready(n).await {
            Ok(()) => remaining -= step as u64,
            Err(insufficient) => {
                // Larger than one second's quota: take it in capacity-sized pieces.
                let capacity = insufficient.0.max(1) as u64;
                let piece = remaining.min(capacity) as u32;
                if let Some(piece) = NonZeroU32::new(piece) {
                    let _ = limiter.until_n_ready(piece).await;
                }
                remaining -= piece as u64;
            }
        }
    }
}
