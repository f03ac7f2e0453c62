//! Transfer contracts shared by HTTP and BitTorrent downloads.
//!
//! A [`Transfer`] is one entry in the transfer list: it has a lifecycle
//! [`TransferState`], byte counters and speed/ETA/progress estimates derived
//! from a [`SpeedStat`]. Concrete HTTP downloads live in
//! [`crate::download`]; BitTorrent downloads are provided by an external engine
//! through [`crate::bittorrent::BittorrentDownload`].

mod descriptor;
mod manager;
mod speed;
mod state;

use std::path::PathBuf;
use std::time::SystemTime;

use serde::Serialize;

use crate::download::TransferError;

pub use descriptor::TransferDescriptor;
pub use manager::{DownloadsToReview, TransferHandle, TransferManager};
pub use speed::{SPEED_WINDOW, SpeedStat};
pub use state::TransferState;

/// One file inside a transfer.
///
/// HTTP downloads have no items; torrents report one per file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferItem {
    pub name: String,
    pub display_name: String,
    pub path: PathBuf,
    pub size: i64,
    pub downloaded: i64,
    pub progress: i32,
    pub complete: bool,
}

/// Read surface of a transfer plus removal.
pub trait Transfer: Send + Sync {
    /// Source identifier; the URL for HTTP downloads.
    fn name(&self) -> String;

    fn display_name(&self) -> String;

    fn save_path(&self) -> PathBuf;

    /// Partial download location, when the transfer has one.
    fn temp_path(&self) -> Option<PathBuf> {
        None
    }

    /// File to hand to a media player while (or after) downloading.
    fn preview_file(&self) -> Option<PathBuf>;

    /// Expected size in bytes; 0 or less when unknown.
    fn size(&self) -> i64;

    fn created(&self) -> SystemTime;

    fn state(&self) -> TransferState;

    fn bytes_received(&self) -> i64;

    fn bytes_sent(&self) -> i64;

    fn download_speed(&self) -> i64;

    fn upload_speed(&self) -> i64;

    fn is_downloading(&self) -> bool;

    /// Seconds remaining, 0 when done and -1 when unknown.
    fn eta(&self) -> i64;

    fn progress(&self) -> i32;

    fn is_complete(&self) -> bool;

    fn items(&self) -> Vec<TransferItem>;

    /// Cancels the transfer and cleans up its files.
    fn remove(&self, delete_data: bool);
}

/// Callback fired once when a transfer latches COMPLETE.
///
/// An `Err` replaces the COMPLETE state with the classified error state.
pub trait CompletionListener: Send + Sync {
    /// Handles a transfer that just reached COMPLETE.
    ///
    /// # Errors
    ///
    /// Returns a [`TransferError`] when follow-up work for the transfer fails.
    fn on_transfer_complete(&self, transfer: &dyn Transfer) -> Result<(), TransferError>;
}

/// Point-in-time view of a transfer, used for JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct TransferSnapshot {
    pub name: String,
    pub display_name: String,
    pub state: TransferState,
    pub save_path: PathBuf,
    pub size: i64,
    pub bytes_received: i64,
    pub download_speed: i64,
    pub eta: i64,
    pub progress: i32,
    pub complete: bool,
}

impl TransferSnapshot {
    /// Captures the current values of `transfer`.
    #[must_use]
    pub fn of(transfer: &dyn Transfer) -> Self {
        Self {
            name: transfer.name(),
            display_name: transfer.display_name(),
            state: transfer.state(),
            save_path: transfer.save_path(),
            size: transfer.size(),
            bytes_received: transfer.bytes_received(),
            download_speed: transfer.download_speed(),
            eta: transfer.eta(),
            progress: transfer.progress(),
            complete: transfer.is_complete(),
        }
    }
}
