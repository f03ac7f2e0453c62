//! Lifecycle hooks that specialise an [`HttpDownload`].
//!
//! The state machine itself lives in [`HttpDownload`]; a [`DownloadPhases`]
//! implementation decides what a download fetches and what happens between
//! FINISHING and COMPLETE.

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::error::TransferError;
use super::http::HttpDownload;

/// Hooks invoked by [`HttpDownload`] at each lifecycle step.
///
/// Every method has a default; the defaults fetch the descriptor URL into the
/// temp file and then stop in FINISHING.
#[async_trait]
pub trait DownloadPhases: Send + Sync + Debug + 'static {
    /// Starts the first transport phase after the download was queued.
    fn begin(&self, download: &Arc<HttpDownload>) {
        download.start_phase(
            download.descriptor().url().to_owned(),
            download.temp_file().to_path_buf(),
            false,
        );
    }

    /// Called when a transport phase wrote `completed` in full.
    ///
    /// # Errors
    ///
    /// An `Err` moves the download into the classified error state.
    fn on_http_complete(
        &self,
        download: &Arc<HttpDownload>,
        _completed: &Path,
    ) -> Result<(), TransferError> {
        download.finish();
        Ok(())
    }

    /// Post-processing run on the worker pool while FINISHING.
    ///
    /// # Errors
    ///
    /// An `Err` moves the download into the classified error state.
    async fn on_finishing(&self, _download: &Arc<HttpDownload>) -> Result<(), TransferError> {
        Ok(())
    }

    /// Runs once the download latched COMPLETE.
    ///
    /// # Errors
    ///
    /// An `Err` replaces COMPLETE with the classified error state.
    fn on_complete(&self, _download: &HttpDownload) -> Result<(), TransferError> {
        Ok(())
    }

    /// Cleanup before an error state is latched.
    fn on_error(&self, _download: &HttpDownload) {}

    /// Extra cleanup after the download was cancelled.
    fn on_remove(&self, _download: &HttpDownload, _delete_data: bool) {}
}

/// Fetches into the temp file and stays in FINISHING.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasePhases;

impl DownloadPhases for BasePhases {}

/// Fetches into the temp file, then moves it to the save path.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveOnFinish;

#[async_trait]
impl DownloadPhases for MoveOnFinish {
    async fn on_finishing(&self, download: &Arc<HttpDownload>) -> Result<(), TransferError> {
        download
            .move_and_complete(download.temp_file(), download.save_file())
            .await
    }
}
