//! Single-transfer download manager.
//!
//! [`controller::TransferController`] owns the state of one download at a
//! time, drives a [`transport::Transport`] and places the fetched content
//! atomically in the download directory.

pub mod controller;
pub mod downloader;
pub mod error;
pub mod finalize;
pub mod hashing;
pub mod presenter;
pub mod state;
pub mod transport;
pub mod utils;

pub use controller::TransferController;
pub use downloader::{HttpConfig, HttpTransport};
pub use presenter::{FileBrowser, Reveal};
pub use state::{TransferSnapshot, TransferState};
pub use transport::{FetchRequest, TransferHandle, TransferId, Transport, TransportEvent};
