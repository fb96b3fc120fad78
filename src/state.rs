use serde::Serialize;
use std::path::PathBuf;
use url::Url;

use crate::utils::progress_label;

/// The single transfer slot owned by a `TransferController`.
///
/// `is_complete` and `is_active` are never both true, and `local_path` is
/// present exactly when `is_complete` is.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TransferState {
    pub source_url: Option<Url>,
    pub local_path: Option<PathBuf>,
    pub is_active: bool,
    /// `NaN` while the total size is unknown.
    pub fraction_complete: f64,
    pub progress_label: String,
    pub is_complete: bool,
    /// Reason the last transfer failed, if it did.
    pub error: Option<String>,
}

/// Immutable copy of the state handed to observers.
pub type TransferSnapshot = TransferState;

impl Default for TransferState {
    fn default() -> Self {
        Self {
            source_url: None,
            local_path: None,
            is_active: false,
            fraction_complete: 0.0,
            progress_label: String::new(),
            is_complete: false,
            error: None,
        }
    }
}

impl TransferState {
    pub fn begin(&mut self, url: Option<Url>) {
        self.fraction_complete = 0.0;
        self.progress_label.clear();
        self.is_active = true;
        self.local_path = None;
        self.source_url = url;
        self.is_complete = false;
        self.error = None;
    }

    pub fn reset_idle(&mut self) {
        self.is_active = false;
        self.source_url = None;
        self.local_path = None;
        self.fraction_complete = 0.0;
        self.progress_label.clear();
        self.error = None;
    }

    /// Updates the fraction and its label together.
    pub fn record_progress(&mut self, written: u64, total: Option<u64>) {
        self.fraction_complete = match total {
            Some(total) if total > 0 => written as f64 / total as f64,
            _ => f64::NAN,
        };
        self.progress_label = progress_label(written, total);
    }

    pub fn complete(&mut self, path: PathBuf) {
        self.is_active = false;
        self.local_path = Some(path);
        self.is_complete = true;
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.is_active = false;
        self.is_complete = false;
        self.source_url = None;
        self.local_path = None;
        self.fraction_complete = 0.0;
        self.progress_label.clear();
        self.error = Some(reason.into());
    }
}
