use std::path::PathBuf;
use thiserror::Error;

/// Reasons a fetch ends without producing content.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server responded with {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("failed to stage download: {0}")]
    Io(#[from] std::io::Error),

    #[error("no tokio runtime to run fetches on")]
    NoRuntime,
}

/// Reasons the fetched content could not be placed at its destination.
#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("failed to create download directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to move download into {path:?}: {source}")]
    Replace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
