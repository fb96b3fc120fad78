//! Drives one network-to-disk transfer at a time and publishes its state.
//!
//! The controller is the only writer of [`TransferState`]. Transports report
//! back over an unbounded channel; those events are applied only when the
//! owner of the controller calls [`TransferController::recv`] and
//! [`TransferController::handle_event`] (or [`TransferController::run_until_settled`]),
//! so every mutation happens on the owner's task. Observers get a
//! [`watch`] receiver that always holds the latest snapshot.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::finalize::{place_artifact, run_blocking};
use crate::presenter::Reveal;
use crate::state::{TransferSnapshot, TransferState};
use crate::transport::{
    EventSender, FetchRequest, TransferHandle, TransferId, Transport, TransportEvent,
};

pub struct TransferController {
    state: TransferState,
    published: watch::Sender<TransferSnapshot>,
    transport: Box<dyn Transport>,
    revealer: Arc<dyn Reveal>,
    download_dir: PathBuf,
    events_tx: EventSender,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    current: Option<TransferId>,
    handle: Option<TransferHandle>,
    next_id: u64,
}

impl TransferController {
    pub fn new(
        transport: Box<dyn Transport>,
        revealer: Arc<dyn Reveal>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        let state = TransferState::default();
        let (published, _) = watch::channel(state.clone());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            state,
            published,
            transport,
            revealer,
            download_dir: download_dir.into(),
            events_tx,
            events_rx,
            current: None,
            handle: None,
            next_id: 1,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TransferSnapshot> {
        self.published.subscribe()
    }

    pub fn snapshot(&self) -> TransferSnapshot {
        self.state.clone()
    }

    /// Id of the transfer whose events are currently accepted.
    pub fn current_transfer(&self) -> Option<TransferId> {
        self.current
    }

    /// Starts fetching `url`, abandoning any transfer still in flight.
    ///
    /// An absent or unparsable URL still resets the state but issues no
    /// fetch.
    pub fn start(&mut self, url: Option<&str>) {
        if let Some(previous) = self.handle.take() {
            if self.state.is_active {
                info!(id = %previous.id(), "Superseding active transfer");
            }
            previous.cancel();
        }
        self.current = None;

        let url = url.and_then(|raw| match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(url = raw, error = %e, "Ignoring malformed URL");
                None
            }
        });

        self.state.begin(url.clone());

        if let Some(url) = url {
            let id = TransferId(self.next_id);
            self.next_id += 1;
            info!(%id, %url, "Starting transfer");

            let handle = self.transport.begin(FetchRequest {
                id,
                url,
                events: self.events_tx.clone(),
            });
            self.current = Some(id);
            self.handle = Some(handle);
        }

        self.publish();
    }

    /// Abandons the active transfer and returns to idle immediately.
    ///
    /// Transport teardown finishes in the background; its late events are
    /// discarded.
    pub fn cancel(&mut self) {
        if !self.state.is_active {
            return;
        }

        if let Some(handle) = self.handle.take() {
            info!(id = %handle.id(), "Cancelling transfer");
            handle.cancel();
        }
        self.current = None;
        self.state.reset_idle();
        self.publish();
    }

    /// Shows the finished artifact in a file browser. No-op unless complete.
    pub fn reveal_completed_artifact(&self) {
        if !self.state.is_complete {
            return;
        }
        if let Some(path) = &self.state.local_path {
            self.revealer.reveal(path, &self.download_dir);
        }
    }

    /// Waits for the next transport event. Never returns `None` while the
    /// controller is alive since it holds a sender itself.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.events_rx.recv().await
    }

    /// Applies a transport notification to the state.
    pub fn handle_event(&mut self, event: TransportEvent) {
        if self.current != Some(event.id()) {
            debug!(id = %event.id(), current = ?self.current, "Dropping event from stale transfer");
            return;
        }

        match event {
            TransportEvent::Progress { written, total, .. } => self.on_progress(written, total),
            TransportEvent::Finished {
                content,
                suggested_filename,
                ..
            } => self.on_finished(content, suggested_filename.as_deref()),
            TransportEvent::Failed { reason, .. } => self.on_failed(reason),
        }
    }

    /// Applies events until the transfer completes, fails or is cancelled.
    pub async fn run_until_settled(&mut self) -> TransferSnapshot {
        while self.state.is_active && self.current.is_some() {
            match self.recv().await {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
        self.snapshot()
    }

    fn on_progress(&mut self, written: u64, total: Option<u64>) {
        self.state.record_progress(written, total);
        self.publish();
    }

    fn on_finished(&mut self, content: tempfile::TempPath, suggested_filename: Option<&str>) {
        self.handle = None;
        self.current = None;

        let dir = &self.download_dir;
        match run_blocking(|| place_artifact(content, dir, suggested_filename)) {
            Ok(path) => {
                info!(path = ?path, "Transfer complete");
                self.state.complete(path);
            }
            Err(e) => {
                error!(error = %e, "Failed to finalize download");
                self.state.fail(e.to_string());
            }
        }
        self.publish();
    }

    fn on_failed(&mut self, reason: String) {
        warn!(%reason, "Transfer failed");
        self.handle = None;
        self.current = None;
        self.state.fail(reason);
        self.publish();
    }

    fn publish(&self) {
        self.published.send_replace(self.state.clone());
    }
}

impl Drop for TransferController {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
    }
}
