//! Transfer progress reporting.
//!
//! The client notifies the installed sink once before pumping, then with
//! the cumulative byte count after every chunk (64 KiB granularity, never
//! per byte), then once at the end of the transfer, including error exits.
//! Listings pump through [`NoopProgress`] so their bytes are not counted.

use serde::{Deserialize, Serialize};

/// Direction of a file transfer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TransferDirection {
    Upload,
    Download,
}

/// Identity of the transfer a progress report belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferInfo {
    /// Remote path of the file being transferred.
    pub name: String,
    pub direction: TransferDirection,
}

/// Receiver for transfer progress events. Implementations must tolerate
/// `start` being called again after `stop` (one transfer after another),
/// but calls are never concurrent.
pub trait ProgressSink: Send {
    fn start(&mut self, info: &TransferInfo);
    /// Cumulative bytes moved since `start`.
    fn update(&mut self, bytes_transferred: u64);
    fn stop(&mut self);
}

/// Sink that discards every event. Installed by default, and always used
/// for listing transfers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn start(&mut self, _info: &TransferInfo) {}
    fn update(&mut self, _bytes_transferred: u64) {}
    fn stop(&mut self) {}
}
