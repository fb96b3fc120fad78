use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fetchpkg::{
    FetchRequest, Reveal, TransferController, TransferHandle, TransferSnapshot, Transport,
    TransportEvent,
};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct ScriptedTransport {
    started: Arc<Mutex<Vec<(FetchRequest, CancellationToken)>>>,
}

impl ScriptedTransport {
    fn last(&self) -> (FetchRequest, CancellationToken) {
        self.started.lock().unwrap().last().cloned().unwrap()
    }
}

impl Transport for ScriptedTransport {
    fn begin(&self, request: FetchRequest) -> TransferHandle {
        let token = CancellationToken::new();
        let id = request.id;
        self.started.lock().unwrap().push((request, token.clone()));
        TransferHandle::new(id, token)
    }
}

#[derive(Default)]
struct RecordingRevealer {
    calls: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl Reveal for RecordingRevealer {
    fn reveal(&self, path: &Path, root: &Path) {
        self.calls
            .lock()
            .unwrap()
            .push((path.to_path_buf(), root.to_path_buf()));
    }
}

struct Harness {
    controller: TransferController,
    transport: ScriptedTransport,
    revealer: Arc<RecordingRevealer>,
    dir: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::default();
        let revealer = Arc::new(RecordingRevealer::default());
        let controller =
            TransferController::new(Box::new(transport.clone()), revealer.clone(), dir.path());
        Self {
            controller,
            transport,
            revealer,
            dir,
        }
    }

    fn staged(&self, body: &[u8]) -> tempfile::TempPath {
        let mut file = tempfile::NamedTempFile::new_in(self.dir.path()).unwrap();
        file.write_all(body).unwrap();
        file.into_temp_path()
    }

    fn progress(&mut self, written: u64, total: Option<u64>) -> TransferSnapshot {
        let id = self.transport.last().0.id;
        self.controller.handle_event(TransportEvent::Progress { id, written, total });
        self.checked()
    }

    fn finish(&mut self, body: &[u8], name: Option<&str>) -> TransferSnapshot {
        let id = self.transport.last().0.id;
        let content = self.staged(body);
        self.controller.handle_event(TransportEvent::Finished {
            id,
            content,
            suggested_filename: name.map(str::to_owned),
        });
        self.checked()
    }

    fn fail(&mut self, reason: &str) -> TransferSnapshot {
        let id = self.transport.last().0.id;
        self.controller.handle_event(TransportEvent::Failed {
            id,
            reason: reason.to_owned(),
        });
        self.checked()
    }

    fn checked(&self) -> TransferSnapshot {
        let state = self.controller.snapshot();
        if state.is_complete {
            assert!(state.local_path.is_some(), "complete without a path");
            assert!(!state.is_active, "complete while active");
        } else {
            assert!(state.local_path.is_none(), "path without completion");
        }
        state
    }
}

#[test]
fn progress_sequence_is_published_with_matching_labels() {
    let mut h = Harness::new();
    h.controller.start(Some("https://example.com/image.pkg"));

    let mut fractions = vec![];
    for (written, needle) in [(100, "100"), (500, "500"), (1000, "1000")] {
        let state = h.progress(written, Some(1000));
        assert!(state.progress_label.contains(needle), "{}", state.progress_label);
        assert!(state.progress_label.contains("1000"), "{}", state.progress_label);
        fractions.push(state.fraction_complete);
    }
    assert_eq!(fractions, vec![0.1, 0.5, 1.0]);
}

#[test]
fn unknown_total_keeps_label_but_no_fraction() {
    let mut h = Harness::new();
    h.controller.start(Some("https://example.com/stream"));

    let state = h.progress(4096, None);
    assert!(state.fraction_complete.is_nan());
    assert!(state.progress_label.contains("KiB") || state.progress_label.contains("4096"));
}

#[test]
fn cancel_always_lands_in_idle() {
    let mut h = Harness::new();

    // Idle: nothing to do.
    h.controller.cancel();
    let state = h.checked();
    assert!(!state.is_active && state.source_url.is_none() && state.fraction_complete == 0.0);

    // Mid-transfer.
    h.controller.start(Some("https://example.com/image.pkg"));
    h.progress(300, Some(1000));
    h.controller.cancel();
    let state = h.checked();
    assert!(!state.is_active);
    assert!(state.source_url.is_none());
    assert!(state.local_path.is_none());
    assert_eq!(state.fraction_complete, 0.0);
    assert!(state.progress_label.is_empty());
    assert!(h.transport.last().1.is_cancelled());

    // Twice in a row.
    h.controller.cancel();
    assert_eq!(h.checked().fraction_complete, 0.0);

    // After the transport gave up.
    h.controller.start(Some("https://example.com/image.pkg"));
    h.progress(300, Some(1000));
    let failed = h.fail("connection reset");
    assert_eq!(failed.error.as_deref(), Some("connection reset"));
    h.controller.cancel();
    let state = h.checked();
    assert!(!state.is_active);
    assert!(state.source_url.is_none());
    assert_eq!(state.fraction_complete, 0.0);
    assert!(state.progress_label.is_empty());
}

#[test]
fn zero_length_content_reports_known_total() {
    let mut h = Harness::new();
    h.controller.start(Some("https://example.com/empty.pkg"));

    let state = h.progress(0, Some(0));
    assert!(state.fraction_complete.is_nan());
    assert_eq!(state.progress_label, "0 B/0 B");
}

#[test]
fn start_then_finish_completes_regardless_of_progress_count() {
    for progress_events in [0u64, 1, 25] {
        let mut h = Harness::new();
        h.controller.start(Some("https://example.com/image.pkg"));
        for i in 1..=progress_events {
            h.progress(i * 10, Some(progress_events * 10));
        }

        let state = h.finish(b"payload", Some("image.pkg"));
        let expected = h.dir.path().join("image.pkg");
        assert!(state.is_complete);
        assert!(!state.is_active);
        assert_eq!(state.local_path.as_deref(), Some(expected.as_path()));
        assert_eq!(std::fs::read(expected).unwrap(), b"payload");
    }
}

#[test]
fn finish_replaces_existing_artifact() {
    let mut h = Harness::new();
    let destination = h.dir.path().join("image.pkg");
    std::fs::write(&destination, b"old contents").unwrap();

    h.controller.start(Some("https://example.com/image.pkg"));
    let state = h.finish(b"new contents", Some("image.pkg"));

    assert_eq!(state.local_path.as_deref(), Some(destination.as_path()));
    assert_eq!(std::fs::read(&destination).unwrap(), b"new contents");
}

#[test]
fn unnamed_downloads_get_unique_names() {
    let mut h = Harness::new();

    h.controller.start(Some("https://example.com/"));
    let first = h.finish(b"one", None).local_path.unwrap();
    h.controller.start(Some("https://example.com/"));
    let second = h.finish(b"two", None).local_path.unwrap();

    assert_ne!(first, second);
    assert!(!first.file_name().unwrap().is_empty());
    assert_eq!(std::fs::read(first).unwrap(), b"one");
    assert_eq!(std::fs::read(second).unwrap(), b"two");
}

#[test]
fn reveal_is_a_no_op_until_complete() {
    let mut h = Harness::new();

    h.controller.reveal_completed_artifact();
    h.controller.start(Some("https://example.com/image.pkg"));
    h.progress(1, Some(2));
    h.controller.reveal_completed_artifact();
    assert!(h.revealer.calls.lock().unwrap().is_empty());

    let path = h.finish(b"x", Some("image.pkg")).local_path.unwrap();
    h.controller.reveal_completed_artifact();

    let calls = h.revealer.calls.lock().unwrap();
    assert_eq!(calls.as_slice(), &[(path, h.dir.path().to_path_buf())]);
}

#[test]
fn new_start_clears_previous_completion() {
    let mut h = Harness::new();
    h.controller.start(Some("https://example.com/a.pkg"));
    h.progress(1, Some(1));
    h.finish(b"a", Some("a.pkg"));

    h.controller.start(Some("https://example.com/b.pkg"));
    let state = h.checked();
    assert!(state.is_active);
    assert!(!state.is_complete);
    assert_eq!(state.fraction_complete, 0.0);
    assert!(state.progress_label.is_empty());
    assert_eq!(h.transport.started.lock().unwrap().len(), 2);
}
