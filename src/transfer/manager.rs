//! Registry of active transfers.
//!
//! HTTP transfers are kept in insertion order; BitTorrent downloads are keyed
//! by info hash as reported by the engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use tracing::{debug, info};

use super::{CompletionListener, Transfer};
use crate::bittorrent::BittorrentDownload;
use crate::download::{HttpDownload, TransferError, YouTubeDownload};

/// Counter of completed downloads the user has not looked at yet.
#[derive(Debug, Default)]
pub struct DownloadsToReview(AtomicUsize);

impl DownloadsToReview {
    #[must_use]
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(0, Ordering::SeqCst);
    }
}

impl CompletionListener for DownloadsToReview {
    fn on_transfer_complete(&self, transfer: &dyn Transfer) -> Result<(), TransferError> {
        self.increment();
        debug!(name = %transfer.name(), pending = self.count(), "download ready for review");
        Ok(())
    }
}

/// A registered transfer of either kind.
#[derive(Clone)]
pub enum TransferHandle {
    Http(Arc<dyn Transfer>),
    Bittorrent(Arc<dyn BittorrentDownload>),
}

impl TransferHandle {
    #[must_use]
    pub fn as_transfer(&self) -> &dyn Transfer {
        match self {
            Self::Http(transfer) => transfer.as_ref(),
            Self::Bittorrent(download) => download.as_transfer(),
        }
    }
}

impl std::fmt::Debug for TransferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (kind, transfer) = match self {
            Self::Http(_) => ("Http", self.as_transfer()),
            Self::Bittorrent(_) => ("Bittorrent", self.as_transfer()),
        };
        f.debug_struct(kind)
            .field("name", &transfer.name())
            .field("state", &transfer.state())
            .finish()
    }
}

/// Owns the transfer list shown to the user.
#[derive(Default)]
pub struct TransferManager {
    http: RwLock<Vec<Arc<dyn Transfer>>>,
    torrents: DashMap<String, Arc<dyn BittorrentDownload>>,
    review: Arc<DownloadsToReview>,
    started: AtomicUsize,
}

impl TransferManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an HTTP download and counts it towards downloads to review
    /// once it completes.
    pub fn add_http_download(&self, download: Arc<HttpDownload>) {
        self.attach_review_listener(&download);
        self.add_transfer(download);
    }

    /// Registers a YouTube download; its inner HTTP download feeds the
    /// downloads to review counter.
    pub fn add_youtube_download(&self, download: YouTubeDownload) {
        self.attach_review_listener(download.download());
        self.add_transfer(Arc::new(download));
    }

    fn attach_review_listener(&self, download: &HttpDownload) {
        let listener: Arc<dyn CompletionListener> = Arc::clone(&self.review) as _;
        if !download.set_completion_listener(listener) {
            debug!(url = download.descriptor().url(), "completion listener already set");
        }
    }

    /// Registers any non-torrent transfer.
    pub fn add_transfer(&self, transfer: Arc<dyn Transfer>) {
        info!(name = %transfer.name(), "transfer added");
        self.http
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(transfer);
        self.increment_started_transfers();
    }

    /// Registers a torrent under its info hash, replacing any previous entry.
    pub fn add_bittorrent(&self, download: Arc<dyn BittorrentDownload>) {
        let hash = download.info_hash();
        info!(info_hash = %hash, "torrent added");
        self.torrents.insert(hash, download);
        self.increment_started_transfers();
    }

    /// All transfers, HTTP first.
    #[must_use]
    pub fn transfers(&self) -> Vec<TransferHandle> {
        let mut transfers: Vec<TransferHandle> = self
            .http_snapshot()
            .into_iter()
            .map(TransferHandle::Http)
            .collect();
        transfers.extend(
            self.torrents
                .iter()
                .map(|entry| TransferHandle::Bittorrent(Arc::clone(entry.value()))),
        );
        transfers
    }

    #[must_use]
    pub fn bittorrent_download(&self, info_hash: &str) -> Option<Arc<dyn BittorrentDownload>> {
        self.torrents
            .get(info_hash)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// True if an HTTP transfer for `url` is currently downloading.
    #[must_use]
    pub fn is_already_downloading(&self, url: &str) -> bool {
        self.http_snapshot()
            .iter()
            .any(|t| t.is_downloading() && t.name() == url)
    }

    /// Drops `transfer` from the registry without cancelling it.
    pub fn remove(&self, transfer: &TransferHandle) -> bool {
        match transfer {
            TransferHandle::Http(target) => {
                let mut http = self.http.write().unwrap_or_else(PoisonError::into_inner);
                let before = http.len();
                http.retain(|t| !Arc::ptr_eq(t, target));
                before != http.len()
            }
            TransferHandle::Bittorrent(target) => {
                self.torrents.remove(&target.info_hash()).is_some()
            }
        }
    }

    /// Drops finished HTTP transfers, and torrents that are complete and
    /// paused or errored.
    pub fn clear_complete(&self) {
        self.http
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|t| !t.is_complete());
        self.torrents.retain(|_, bt| {
            let finished = bt.is_complete() && bt.is_paused();
            !(finished || bt.state().is_errored())
        });
    }

    /// Transfers currently receiving data.
    #[must_use]
    pub fn active_downloads(&self) -> usize {
        self.transfers()
            .iter()
            .map(TransferHandle::as_transfer)
            .filter(|t| !t.state().is_errored() && !t.is_complete() && t.is_downloading())
            .count()
    }

    /// Finished torrents that are still seeding.
    #[must_use]
    pub fn active_uploads(&self) -> usize {
        self.torrents
            .iter()
            .filter(|entry| {
                let bt = entry.value();
                !bt.state().is_errored() && bt.is_finished() && !bt.is_paused()
            })
            .count()
    }

    /// Combined download speed of every transfer in bytes per second.
    #[must_use]
    pub fn downloads_bandwidth(&self) -> i64 {
        self.transfers()
            .iter()
            .map(|t| t.as_transfer().download_speed())
            .sum()
    }

    /// Combined upload speed of every torrent in bytes per second.
    #[must_use]
    pub fn uploads_bandwidth(&self) -> i64 {
        self.torrents
            .iter()
            .map(|entry| entry.value().upload_speed())
            .sum()
    }

    #[must_use]
    pub fn downloads_to_review(&self) -> usize {
        self.review.count()
    }

    pub fn increment_downloads_to_review(&self) {
        self.review.increment();
    }

    pub fn clear_downloads_to_review(&self) {
        self.review.clear();
    }

    /// Listener that bumps the downloads-to-review counter.
    #[must_use]
    pub fn review_listener(&self) -> Arc<DownloadsToReview> {
        Arc::clone(&self.review)
    }

    /// Pauses torrents that are seeding or complete.
    pub fn stop_seeding_torrents(&self) {
        for entry in &self.torrents {
            let bt = entry.value();
            if bt.is_seeding() || bt.is_complete() {
                bt.pause();
            }
        }
    }

    /// Pauses every torrent that is not seeding.
    pub fn pause_torrents(&self) {
        for entry in &self.torrents {
            if !entry.value().is_seeding() {
                entry.value().pause();
            }
        }
    }

    /// Resumes paused torrents that still have data to fetch.
    pub fn resume_resumable_torrents(&self) {
        for entry in &self.torrents {
            let bt = entry.value();
            if bt.is_paused() && !bt.is_finished() {
                bt.resume();
            }
        }
    }

    /// Resumes finished torrents so they seed.
    pub fn seed_finished_torrents(&self) {
        for entry in &self.torrents {
            let bt = entry.value();
            if bt.is_finished() {
                bt.resume();
            }
        }
    }

    #[must_use]
    pub fn is_http_download_in_progress(&self) -> bool {
        self.http_snapshot().iter().any(|t| t.is_downloading())
    }

    /// Cancels every HTTP transfer that is still downloading.
    pub fn stop_http_transfers(&self) {
        for transfer in self.http_snapshot() {
            if !transfer.is_complete() && transfer.is_downloading() {
                transfer.remove(false);
            }
        }
    }

    pub fn increment_started_transfers(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    pub fn reset_started_transfers(&self) {
        self.started.store(0, Ordering::SeqCst);
    }

    #[must_use]
    pub fn started_transfers(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    fn http_snapshot(&self) -> Vec<Arc<dyn Transfer>> {
        self.http
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for TransferManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferManager")
            .field("http", &self.http_snapshot().len())
            .field("torrents", &self.torrents.len())
            .field("downloads_to_review", &self.review.count())
            .field("started", &self.started_transfers())
            .finish()
    }
}
