//! Lifecycle states shared by HTTP and BitTorrent transfers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of a transfer.
///
/// HTTP downloads only ever visit a handful of these; the rest are reported by
/// the BitTorrent engine integration and media post-processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferState {
    Waiting,
    Queued,
    Downloading,
    Finishing,
    Demuxing,
    Scanning,
    Checking,
    DownloadingMetadata,
    DownloadingTorrent,
    Finished,
    Seeding,
    Paused,
    Pausing,
    Canceling,
    Canceled,
    Complete,
    Uploading,
    Uncompressing,
    Stopped,
    Redirecting,
    Streaming,
    Unknown,
    Error,
    ErrorMovingIncomplete,
    ErrorHashMd5,
    ErrorSignature,
    ErrorNotEnoughPeers,
    ErrorNoInternet,
    ErrorSaveDir,
    ErrorTempDir,
    ErrorDiskFull,
    ErrorConnectionTimedOut,
}

impl TransferState {
    /// Every state, in declaration order.
    pub const ALL: [Self; 32] = [
        Self::Waiting,
        Self::Queued,
        Self::Downloading,
        Self::Finishing,
        Self::Demuxing,
        Self::Scanning,
        Self::Checking,
        Self::DownloadingMetadata,
        Self::DownloadingTorrent,
        Self::Finished,
        Self::Seeding,
        Self::Paused,
        Self::Pausing,
        Self::Canceling,
        Self::Canceled,
        Self::Complete,
        Self::Uploading,
        Self::Uncompressing,
        Self::Stopped,
        Self::Redirecting,
        Self::Streaming,
        Self::Unknown,
        Self::Error,
        Self::ErrorMovingIncomplete,
        Self::ErrorHashMd5,
        Self::ErrorSignature,
        Self::ErrorNotEnoughPeers,
        Self::ErrorNoInternet,
        Self::ErrorSaveDir,
        Self::ErrorTempDir,
        Self::ErrorDiskFull,
        Self::ErrorConnectionTimedOut,
    ];

    /// Returns the stable wire/display label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Queued => "QUEUED",
            Self::Downloading => "DOWNLOADING",
            Self::Finishing => "FINISHING",
            Self::Demuxing => "DEMUXING",
            Self::Scanning => "SCANNING",
            Self::Checking => "CHECKING",
            Self::DownloadingMetadata => "DOWNLOADING_METADATA",
            Self::DownloadingTorrent => "DOWNLOADING_TORRENT",
            Self::Finished => "FINISHED",
            Self::Seeding => "SEEDING",
            Self::Paused => "PAUSED",
            Self::Pausing => "PAUSING",
            Self::Canceling => "CANCELING",
            Self::Canceled => "CANCELED",
            Self::Complete => "COMPLETE",
            Self::Uploading => "UPLOADING",
            Self::Uncompressing => "UNCOMPRESSING",
            Self::Stopped => "STOPPED",
            Self::Redirecting => "REDIRECTING",
            Self::Streaming => "STREAMING",
            Self::Unknown => "UNKNOWN",
            Self::Error => "ERROR",
            Self::ErrorMovingIncomplete => "ERROR_MOVING_INCOMPLETE",
            Self::ErrorHashMd5 => "ERROR_HASH_MD5",
            Self::ErrorSignature => "ERROR_SIGNATURE",
            Self::ErrorNotEnoughPeers => "ERROR_NOT_ENOUGH_PEERS",
            Self::ErrorNoInternet => "ERROR_NO_INTERNET",
            Self::ErrorSaveDir => "ERROR_SAVE_DIR",
            Self::ErrorTempDir => "ERROR_TEMP_DIR",
            Self::ErrorDiskFull => "ERROR_DISK_FULL",
            Self::ErrorConnectionTimedOut => "ERROR_CONNECTION_TIMED_OUT",
        }
    }

    /// True for every `ERROR*` state.
    #[must_use]
    pub fn is_errored(self) -> bool {
        matches!(
            self,
            Self::Error
                | Self::ErrorMovingIncomplete
                | Self::ErrorHashMd5
                | Self::ErrorSignature
                | Self::ErrorNotEnoughPeers
                | Self::ErrorNoInternet
                | Self::ErrorSaveDir
                | Self::ErrorTempDir
                | Self::ErrorDiskFull
                | Self::ErrorConnectionTimedOut
        )
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransferState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("invalid transfer state: {s}"))
    }
}
