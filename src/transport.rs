//! The seam between the controller and whatever moves the bytes.
//!
//! A transport starts fetches on request and reports back through
//! [`TransportEvent`]s sent on the channel it was handed. Events carry the
//! [`TransferId`] of the fetch that produced them so the controller can drop
//! notifications from fetches it has already abandoned.

use std::fmt;
use tempfile::TempPath;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(pub u64);

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
pub enum TransportEvent {
    Progress {
        id: TransferId,
        written: u64,
        /// `None` when the remote end did not announce a size.
        total: Option<u64>,
    },
    /// The body is fully written to `content`. Dropping the event deletes it.
    Finished {
        id: TransferId,
        content: TempPath,
        suggested_filename: Option<String>,
    },
    Failed {
        id: TransferId,
        reason: String,
    },
}

impl TransportEvent {
    pub fn id(&self) -> TransferId {
        match self {
            Self::Progress { id, .. } | Self::Finished { id, .. } | Self::Failed { id, .. } => *id,
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Everything a transport needs to run one fetch.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub id: TransferId,
    pub url: Url,
    pub events: EventSender,
}

/// Handle to an in-flight fetch.
#[derive(Debug)]
pub struct TransferHandle {
    id: TransferId,
    token: CancellationToken,
}

impl TransferHandle {
    pub fn new(id: TransferId, token: CancellationToken) -> Self {
        Self { id, token }
    }

    pub fn id(&self) -> TransferId {
        self.id
    }

    /// Requests teardown without waiting for it.
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

pub trait Transport: Send + Sync {
    /// Starts fetching `request.url`. Must not block; errors are reported as
    /// [`TransportEvent::Failed`] on `request.events`.
    fn begin(&self, request: FetchRequest) -> TransferHandle;
}
