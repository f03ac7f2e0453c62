//! HTTP download state machine.
//!
//! ```text
//! WAITING --start()--> QUEUED --(pool slot)--> DOWNLOADING
//! DOWNLOADING --body written--> FINISHING --post-processing--> SCANNING --> COMPLETE
//! DOWNLOADING --transport error--> ERROR*
//! any non-terminal --remove()--> CANCELED
//! ```
//!
//! State and the complete latch share one `watch` cell so that transitions
//! are atomic and observers can await the terminal state. Once latched, the
//! state only changes again when a completion hook fails, which replaces
//! COMPLETE with the classified error.

use std::fmt;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::SystemTime;

use tokio::sync::watch;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::classify::classify;
use super::error::TransferError;
use super::filename::{build_file, cleanup_filename, filename_from_url};
use super::phases::{DownloadPhases, MoveOnFinish};
use super::transport::{HttpTransport, SaveOutcome, TransportListener};
use crate::platform::{FileSystem, WorkerPool};
use crate::transfer::{
    CompletionListener, SpeedStat, Transfer, TransferDescriptor, TransferItem, TransferState,
};

/// Name used when neither the descriptor nor the URL yields a filename.
const FALLBACK_FILENAME: &str = "download";

/// Collaborators shared by every download.
#[derive(Debug, Clone)]
pub struct TransferContext {
    pub transport: Arc<dyn HttpTransport>,
    pub fs: Arc<dyn FileSystem>,
    pub pool: WorkerPool,
}

/// Observable lifecycle value of a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleStatus {
    pub state: TransferState,
    /// Set once the download reached a terminal state.
    pub complete: bool,
}

/// A single-URL HTTP download.
pub struct HttpDownload {
    descriptor: TransferDescriptor,
    save_path: PathBuf,
    temp_path: PathBuf,
    created: SystemTime,
    cell: watch::Sender<LifecycleStatus>,
    stat: Mutex<SpeedStat>,
    context: TransferContext,
    phases: Arc<dyn DownloadPhases>,
    completion_listener: OnceLock<Arc<dyn CompletionListener>>,
}

impl HttpDownload {
    /// Creates a download in WAITING.
    ///
    /// Missing directories are created; when that fails the download is
    /// latched in ERROR_SAVE_DIR or ERROR_TEMP_DIR and never starts.
    pub fn new(
        descriptor: TransferDescriptor,
        save_dir: &Path,
        temp_dir: &Path,
        context: TransferContext,
        phases: Arc<dyn DownloadPhases>,
    ) -> Arc<Self> {
        let fs = Arc::clone(&context.fs);
        let filename = local_filename(&descriptor);

        let initial = if !fs.is_directory(save_dir) && !fs.mkdirs(save_dir) {
            warn!(dir = %save_dir.display(), "save directory unavailable");
            LifecycleStatus {
                state: TransferState::ErrorSaveDir,
                complete: true,
            }
        } else if !fs.is_directory(temp_dir) && !fs.mkdirs(temp_dir) {
            warn!(dir = %temp_dir.display(), "temp directory unavailable");
            LifecycleStatus {
                state: TransferState::ErrorTempDir,
                complete: true,
            }
        } else {
            LifecycleStatus {
                state: TransferState::Waiting,
                complete: false,
            }
        };

        let save_path = build_file(fs.as_ref(), save_dir, &filename);
        let temp_path = build_file(fs.as_ref(), temp_dir, &filename);
        debug!(
            url = descriptor.url(),
            save = %save_path.display(),
            temp = %temp_path.display(),
            state = %initial.state,
            "download created"
        );

        Arc::new(Self {
            descriptor,
            save_path,
            temp_path,
            created: SystemTime::now(),
            cell: watch::Sender::new(initial),
            stat: Mutex::new(SpeedStat::new()),
            context,
            phases,
            completion_listener: OnceLock::new(),
        })
    }

    /// Creates a download that moves the finished temp file to the save path.
    pub fn plain(
        descriptor: TransferDescriptor,
        save_dir: &Path,
        temp_dir: &Path,
        context: TransferContext,
    ) -> Arc<Self> {
        Self::new(descriptor, save_dir, temp_dir, context, Arc::new(MoveOnFinish))
    }

    #[must_use]
    pub fn descriptor(&self) -> &TransferDescriptor {
        &self.descriptor
    }

    /// Final location of the downloaded file.
    #[must_use]
    pub fn save_file(&self) -> &Path {
        &self.save_path
    }

    /// Location the transport writes to.
    #[must_use]
    pub fn temp_file(&self) -> &Path {
        &self.temp_path
    }

    #[must_use]
    pub fn context(&self) -> &TransferContext {
        &self.context
    }

    /// Current lifecycle value.
    #[must_use]
    pub fn status(&self) -> LifecycleStatus {
        *self.cell.borrow()
    }

    /// Watches lifecycle changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LifecycleStatus> {
        self.cell.subscribe()
    }

    /// Resolves once the download latched, returning the terminal state.
    pub async fn wait_until_complete(&self) -> TransferState {
        let mut rx = self.cell.subscribe();
        match rx.wait_for(|status| status.complete).await {
            Ok(status) => status.state,
            Err(_) => self.status().state,
        }
    }

    /// Registers the listener notified when the download reaches COMPLETE.
    ///
    /// Returns false if a listener was already set.
    pub fn set_completion_listener(&self, listener: Arc<dyn CompletionListener>) -> bool {
        self.completion_listener.set(listener).is_ok()
    }

    /// Queues the download. Only a WAITING download can be started.
    pub fn start(self: &Arc<Self>) {
        let accepted = self.cell.send_if_modified(|status| {
            if status.complete || status.state != TransferState::Waiting {
                return false;
            }
            status.state = TransferState::Queued;
            true
        });
        if !accepted {
            debug!(url = self.descriptor.url(), state = %self.status().state, "start ignored");
            return;
        }
        debug!(url = self.descriptor.url(), "queued");
        self.phases.begin(self);
    }

    /// Runs one transport phase fetching `url` into `dest` on the pool.
    pub fn start_phase(self: &Arc<Self>, url: String, dest: PathBuf, resume: bool) {
        let download = Arc::clone(self);
        let span = info_span!("transfer", url = %self.descriptor.url());
        self.context.pool.execute(
            async move {
                download.run_phase(&url, &dest, resume).await;
            }
            .instrument(span),
        );
    }

    async fn run_phase(self: Arc<Self>, url: &str, dest: &Path, resume: bool) {
        if self.is_complete() {
            debug!("phase skipped, already complete");
            return;
        }
        self.transition(TransferState::Downloading);

        let listener = DownloadListener {
            download: self.as_ref(),
        };
        let result = self
            .context
            .transport
            .save(url, dest, resume, &listener)
            .await;

        match result {
            Ok(SaveOutcome::Completed) => {
                debug!(dest = %dest.display(), bytes = self.bytes_received(), "transport complete");
                if let Err(e) = self.phases.on_http_complete(&self, dest) {
                    self.error(&e);
                }
            }
            Ok(SaveOutcome::Cancelled) => {
                // The transport may have recreated the file after remove() deleted it
                debug!(dest = %dest.display(), "transport cancelled");
                if !self.context.fs.delete(dest) {
                    warn!(path = %dest.display(), "failed to delete partial file after cancel");
                }
            }
            Err(e) => self.error(&TransferError::from(e)),
        }
    }

    /// Moves to `next` unless the download already latched.
    pub fn transition(&self, next: TransferState) -> bool {
        let changed = self.cell.send_if_modified(|status| {
            if status.complete || status.state == next {
                return false;
            }
            status.state = next;
            true
        });
        if changed {
            debug!(url = self.descriptor.url(), state = %next, "state changed");
        }
        changed
    }

    /// Latches the download in `state`. Returns false if it already latched.
    ///
    /// For COMPLETE the phase hook and the completion listener run before
    /// subscribers are notified, and a hook failure replaces COMPLETE with
    /// the classified error. Subscribers are only woken for the final value.
    /// [`status`](Self::status) read while the hooks run already shows
    /// COMPLETE.
    pub fn complete(&self, state: TransferState) -> bool {
        let run_hooks = state == TransferState::Complete;
        let mut latched = false;
        self.cell.send_if_modified(|status| {
            if status.complete {
                return false;
            }
            *status = LifecycleStatus {
                state,
                complete: true,
            };
            latched = true;
            !run_hooks
        });
        if !latched {
            return false;
        }

        if state.is_errored() {
            error!(url = self.descriptor.url(), state = %state, "download failed");
        } else {
            info!(url = self.descriptor.url(), state = %state, "download latched");
        }

        if run_hooks {
            let outcome = self.run_completion_hooks();
            self.cell.send_modify(|status| {
                if let Err(e) = &outcome {
                    status.state = classify(e);
                    error!(
                        url = self.descriptor.url(),
                        error = %e,
                        state = %status.state,
                        "completion hook failed"
                    );
                }
            });
        }
        true
    }

    fn run_completion_hooks(&self) -> Result<(), TransferError> {
        self.phases.on_complete(self)?;
        if let Some(listener) = self.completion_listener.get() {
            listener.on_transfer_complete(self)?;
        }
        Ok(())
    }

    /// Latches the error state classified from `err`.
    ///
    /// Ignored once the download was cancelled or already latched. The phase
    /// error hook runs before subscribers see the error state.
    pub fn error(&self, err: &TransferError) {
        let status = self.status();
        if status.complete || status.state == TransferState::Canceled {
            debug!(url = self.descriptor.url(), error = %err, "late error ignored");
            return;
        }
        let state = classify(err);
        warn!(url = self.descriptor.url(), error = %err, state = %state, "download error");
        self.phases.on_error(self);
        self.complete(state);
    }

    /// Enters FINISHING and schedules post-processing on the pool.
    pub fn finish(self: &Arc<Self>) {
        if !self.transition(TransferState::Finishing) {
            return;
        }
        let download = Arc::clone(self);
        let span = info_span!("transfer", url = %self.descriptor.url());
        self.context.pool.execute(
            async move {
                let phases = Arc::clone(&download.phases);
                if let Err(e) = phases.on_finishing(&download).await {
                    download.error(&e);
                }
            }
            .instrument(span),
        );
    }

    /// Copies `src` to `dst`, then SCANNING and COMPLETE.
    ///
    /// A failed copy latches ERROR_MOVING_INCOMPLETE and leaves `src` intact.
    /// If the download is removed while the copy runs, both files are deleted.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Join`] if the blocking copy task panicked.
    pub async fn move_and_complete(&self, src: &Path, dst: &Path) -> Result<(), TransferError> {
        let fs = Arc::clone(&self.context.fs);
        let (from, to) = (src.to_path_buf(), dst.to_path_buf());
        let copied = tokio::task::spawn_blocking(move || fs.copy(&from, &to)).await?;

        if !copied {
            self.complete(TransferState::ErrorMovingIncomplete);
            return Ok(());
        }
        if self.is_complete() {
            debug!(
                dst = %dst.display(),
                state = %self.state(),
                "latched during move, discarding copy"
            );
            for path in [dst, src] {
                if !self.context.fs.delete(path) {
                    warn!(path = %path.display(), "failed to delete file after cancelled move");
                }
            }
            return Ok(());
        }
        if !self.context.fs.delete(src) {
            warn!(path = %src.display(), "failed to delete temp file after move");
        }
        self.transition(TransferState::Scanning);
        self.context.fs.scan(dst);
        self.complete(TransferState::Complete);
        Ok(())
    }

    fn record_bytes(&self, len: usize) {
        let len = u32::try_from(len).unwrap_or(u32::MAX);
        self.stat
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .update(len);
    }

    fn with_stat<T>(&self, f: impl FnOnce(&SpeedStat) -> T) -> T {
        let stat = self.stat.lock().unwrap_or_else(PoisonError::into_inner);
        f(&*stat)
    }

    #[allow(clippy::cast_precision_loss)]
    fn target_size(&self) -> f64 {
        self.descriptor.size() as f64
    }
}

impl Transfer for HttpDownload {
    fn name(&self) -> String {
        self.descriptor.url().to_owned()
    }

    fn display_name(&self) -> String {
        self.descriptor.display_name().to_owned()
    }

    fn save_path(&self) -> PathBuf {
        self.save_path.clone()
    }

    fn temp_path(&self) -> Option<PathBuf> {
        Some(self.temp_path.clone())
    }

    fn preview_file(&self) -> Option<PathBuf> {
        if self.is_complete() {
            Some(self.save_path.clone())
        } else if self.context.fs.exists(&self.temp_path) {
            Some(self.temp_path.clone())
        } else {
            None
        }
    }

    fn size(&self) -> i64 {
        self.descriptor.size()
    }

    fn created(&self) -> SystemTime {
        self.created
    }

    fn state(&self) -> TransferState {
        self.status().state
    }

    fn bytes_received(&self) -> i64 {
        self.with_stat(SpeedStat::total_bytes)
    }

    fn bytes_sent(&self) -> i64 {
        0
    }

    fn download_speed(&self) -> i64 {
        if self.is_complete() {
            0
        } else {
            self.with_stat(SpeedStat::average_speed)
        }
    }

    fn upload_speed(&self) -> i64 {
        0
    }

    fn is_downloading(&self) -> bool {
        self.state() == TransferState::Downloading
    }

    fn eta(&self) -> i64 {
        if self.is_complete() {
            0
        } else {
            let target = self.target_size();
            self.with_stat(|stat| stat.eta(target))
        }
    }

    fn progress(&self) -> i32 {
        if self.is_complete() {
            100
        } else {
            let target = self.target_size();
            self.with_stat(|stat| stat.progress(target))
        }
    }

    fn is_complete(&self) -> bool {
        self.status().complete
    }

    fn items(&self) -> Vec<TransferItem> {
        Vec::new()
    }

    fn remove(&self, delete_data: bool) {
        if !self.complete(TransferState::Canceled) {
            debug!(url = self.descriptor.url(), "remove ignored, already complete");
            return;
        }
        if !self.context.fs.delete(&self.temp_path) {
            warn!(path = %self.temp_path.display(), "failed to delete temp file");
        }
        if delete_data && !self.context.fs.delete(&self.save_path) {
            warn!(path = %self.save_path.display(), "failed to delete saved file");
        }
        self.phases.on_remove(self, delete_data);
    }
}

impl fmt::Debug for HttpDownload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpDownload")
            .field("url", &self.descriptor.url())
            .field("save_path", &self.save_path)
            .field("temp_path", &self.temp_path)
            .field("status", &self.status())
            .field("phases", &self.phases)
            .finish_non_exhaustive()
    }
}

/// Feeds transport chunks into the speed counter and stops once latched.
struct DownloadListener<'a> {
    download: &'a HttpDownload,
}

impl TransportListener for DownloadListener<'_> {
    fn on_data(&self, chunk: &[u8]) -> ControlFlow<()> {
        self.download.record_bytes(chunk.len());
        if self.download.is_complete() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

fn local_filename(descriptor: &TransferDescriptor) -> String {
    let cleaned = cleanup_filename(descriptor.filename());
    if !cleaned.trim().is_empty() {
        return cleaned;
    }
    filename_from_url(descriptor.url()).unwrap_or_else(|| FALLBACK_FILENAME.to_owned())
}
