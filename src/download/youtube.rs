//! YouTube downloads: plain video, DASH (separate video and audio legs muxed
//! together) and audio-only demux.
//!
//! A DASH download stays in DOWNLOADING across both legs, then goes through
//! DEMUXING before the muxed file is moved into place.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use super::constants::ARTWORK_TIMEOUT;
use super::error::TransferError;
use super::filename::{cleanup_filename, split_extension};
use super::http::{HttpDownload, TransferContext};
use super::phases::DownloadPhases;
use crate::transfer::{Transfer, TransferDescriptor, TransferItem, TransferState};

const AUTHOR_PREFIX: &str = "YouTube - ";
const AUTHOR_SUFFIX: &str = " (YouTube)";
const METADATA_SOURCE: &str = "YouTube.com";

/// One downloadable stream of a video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    pub url: String,
    pub thumbnail_url: Option<String>,
    /// Uploader name as reported for this stream.
    pub user: Option<String>,
}

/// A crawled YouTube result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YouTubeSource {
    pub display_name: String,
    pub filename: String,
    /// Result source label, e.g. `"YouTube - Channel"`.
    pub source: Option<String>,
    pub video: Option<MediaTrack>,
    pub audio: Option<MediaTrack>,
    pub size: i64,
}

/// Which tracks a download fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadType {
    /// Video only, moved as-is.
    Video,
    /// Video and audio legs muxed into one file.
    Dash,
    /// Audio only, demuxed out of its container.
    Demux,
}

impl DownloadType {
    /// Derives the download type from which tracks exist.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidDescriptor`] when neither track exists.
    pub fn of(source: &YouTubeSource) -> Result<Self, TransferError> {
        match (&source.video, &source.audio) {
            (Some(_), None) => Ok(Self::Video),
            (Some(_), Some(_)) => Ok(Self::Dash),
            (None, Some(_)) => Ok(Self::Demux),
            (None, None) => Err(TransferError::invalid_descriptor(
                "no video or audio track specified",
            )),
        }
    }
}

/// Tags written into the output container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaMetadata {
    pub title: String,
    pub author: Option<String>,
    pub source: String,
    pub artwork: Option<Vec<u8>>,
}

/// MP4 mux/demux collaborator.
///
/// Both calls are blocking and report bytes consumed through `progress`.
pub trait Muxer: Send + Sync + Debug {
    /// Extracts the audio track of `input` into `output`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Media`] when the container cannot be read or written.
    fn demux_audio(
        &self,
        input: &Path,
        output: &Path,
        metadata: &MediaMetadata,
        progress: &dyn Fn(u64),
    ) -> Result<(), TransferError>;

    /// Combines `video` and `audio` into `output`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Media`] when either input cannot be read or the output written.
    fn mux(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        metadata: &MediaMetadata,
        progress: &dyn Fn(u64),
    ) -> Result<(), TransferError>;
}

#[derive(Debug)]
struct YouTubePhases {
    kind: DownloadType,
    source: YouTubeSource,
    temp_video: PathBuf,
    temp_audio: PathBuf,
    muxer: Arc<dyn Muxer>,
    demux_read: Arc<AtomicU64>,
    demux_total: Arc<AtomicU64>,
}

impl YouTubePhases {
    fn metadata_without_artwork(&self) -> MediaMetadata {
        MediaMetadata {
            title: self.source.display_name.clone(),
            author: normalize_author(
                self.source.source.as_deref(),
                self.source.audio.as_ref().and_then(|t| t.user.as_deref()),
            ),
            source: METADATA_SOURCE.to_owned(),
            artwork: None,
        }
    }

    fn artwork_url(&self) -> Option<&str> {
        self.source
            .video
            .as_ref()
            .and_then(|t| t.thumbnail_url.as_deref())
            .or_else(|| {
                self.source
                    .audio
                    .as_ref()
                    .and_then(|t| t.thumbnail_url.as_deref())
            })
    }

    async fn build_metadata(&self, download: &HttpDownload) -> MediaMetadata {
        let mut metadata = self.metadata_without_artwork();
        if let Some(url) = self.artwork_url() {
            match download
                .context()
                .transport
                .fetch_bytes(url, ARTWORK_TIMEOUT)
                .await
            {
                Ok(bytes) => metadata.artwork = Some(bytes),
                Err(e) => warn!(url, error = %e, "failed to fetch artwork"),
            }
        }
        metadata
    }

    #[instrument(skip_all, fields(kind = ?self.kind))]
    async fn remux(&self, download: &Arc<HttpDownload>) -> Result<(), TransferError> {
        download.transition(TransferState::Demuxing);
        let metadata = self.build_metadata(download).await;

        let fs = Arc::clone(&download.context().fs);
        let total = match self.kind {
            DownloadType::Dash => fs.len(&self.temp_video) + fs.len(&self.temp_audio),
            _ => fs.len(&self.temp_audio),
        };
        self.demux_read.store(0, Ordering::SeqCst);
        self.demux_total.store(total, Ordering::SeqCst);

        let kind = self.kind;
        let muxer = Arc::clone(&self.muxer);
        let read = Arc::clone(&self.demux_read);
        let (video, audio) = (self.temp_video.clone(), self.temp_audio.clone());
        let output = download.temp_file().to_path_buf();
        tokio::task::spawn_blocking(move || {
            let progress = |bytes: u64| {
                read.fetch_add(bytes, Ordering::SeqCst);
            };
            if kind == DownloadType::Dash {
                muxer.mux(&video, &audio, &output, &metadata, &progress)
            } else {
                muxer.demux_audio(&audio, &output, &metadata, &progress)
            }
        })
        .await??;

        if !fs.exists(download.temp_file()) {
            return Err(TransferError::media(
                download.temp_file(),
                "muxer produced no output",
            ));
        }
        self.delete_legs(download);
        download
            .move_and_complete(download.temp_file(), download.save_file())
            .await
    }

    fn delete_legs(&self, download: &HttpDownload) {
        let fs = &download.context().fs;
        for leg in [&self.temp_video, &self.temp_audio] {
            if !fs.delete(leg) {
                warn!(path = %leg.display(), "failed to delete temp leg");
            }
        }
    }

    fn track_url(track: Option<&MediaTrack>) -> Option<String> {
        track.map(|t| t.url.clone())
    }
}

#[async_trait]
impl DownloadPhases for YouTubePhases {
    fn begin(&self, download: &Arc<HttpDownload>) {
        let (track, dest) = match self.kind {
            DownloadType::Demux => (self.source.audio.as_ref(), &self.temp_audio),
            DownloadType::Video | DownloadType::Dash => {
                (self.source.video.as_ref(), &self.temp_video)
            }
        };
        match Self::track_url(track) {
            Some(url) => download.start_phase(url, dest.clone(), false),
            None => download.error(&TransferError::invalid_descriptor("missing track")),
        }
    }

    fn on_http_complete(
        &self,
        download: &Arc<HttpDownload>,
        completed: &Path,
    ) -> Result<(), TransferError> {
        if self.kind != DownloadType::Dash {
            download.finish();
            return Ok(());
        }

        let fs = &download.context().fs;
        let video_done = fs.exists(&self.temp_video);
        let audio_done = fs.exists(&self.temp_audio);
        if video_done && !audio_done {
            let url = Self::track_url(self.source.audio.as_ref())
                .ok_or_else(|| TransferError::invalid_descriptor("missing audio track"))?;
            debug!(leg = %self.temp_audio.display(), "starting audio leg");
            download.start_phase(url, self.temp_audio.clone(), false);
            Ok(())
        } else if video_done && audio_done {
            download.finish();
            Ok(())
        } else {
            Err(TransferError::media(completed, "DASH leg missing after download"))
        }
    }

    async fn on_finishing(&self, download: &Arc<HttpDownload>) -> Result<(), TransferError> {
        match self.kind {
            DownloadType::Video => {
                download
                    .move_and_complete(&self.temp_video, download.save_file())
                    .await
            }
            DownloadType::Dash | DownloadType::Demux => self.remux(download).await,
        }
    }

    // Leg names are fixed per filename, so a stale leg would be reused by a retry
    fn on_error(&self, download: &HttpDownload) {
        self.delete_legs(download);
    }

    fn on_remove(&self, download: &HttpDownload, _delete_data: bool) {
        self.delete_legs(download);
    }
}

/// A YouTube download built on [`HttpDownload`].
#[derive(Debug, Clone)]
pub struct YouTubeDownload {
    inner: Arc<HttpDownload>,
    phases: Arc<YouTubePhases>,
}

impl YouTubeDownload {
    /// Creates a download in WAITING.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidDescriptor`] when `source` has no tracks.
    pub fn new(
        source: YouTubeSource,
        save_dir: &Path,
        temp_dir: &Path,
        context: TransferContext,
        muxer: Arc<dyn Muxer>,
    ) -> Result<Self, TransferError> {
        let kind = DownloadType::of(&source)?;
        let primary_url = match kind {
            DownloadType::Demux => source.audio.as_ref(),
            DownloadType::Video | DownloadType::Dash => source.video.as_ref(),
        }
        .map(|t| t.url.clone())
        .unwrap_or_default();

        let cleaned = cleanup_filename(&source.filename);
        let (base, _) = split_extension(&cleaned);
        let temp_video = temp_dir.join(format!("{base}.temp.m4v"));
        let temp_audio = temp_dir.join(format!("{base}.temp.m4a"));

        let descriptor = TransferDescriptor::new(
            primary_url,
            source.filename.clone(),
            source.display_name.clone(),
            source.size,
        );
        let phases = Arc::new(YouTubePhases {
            kind,
            source,
            temp_video,
            temp_audio,
            muxer,
            demux_read: Arc::new(AtomicU64::new(0)),
            demux_total: Arc::new(AtomicU64::new(0)),
        });
        let inner = HttpDownload::new(
            descriptor,
            save_dir,
            temp_dir,
            context,
            Arc::clone(&phases) as Arc<dyn DownloadPhases>,
        );
        Ok(Self { inner, phases })
    }

    /// Queues the first leg.
    pub fn start(&self) {
        self.inner.start();
    }

    /// Underlying state machine.
    #[must_use]
    pub fn download(&self) -> &Arc<HttpDownload> {
        &self.inner
    }

    #[must_use]
    pub fn download_type(&self) -> DownloadType {
        self.phases.kind
    }

    /// Temp file of the video leg.
    #[must_use]
    pub fn temp_video(&self) -> &Path {
        &self.phases.temp_video
    }

    /// Temp file of the audio leg.
    #[must_use]
    pub fn temp_audio(&self) -> &Path {
        &self.phases.temp_audio
    }

    /// Percentage of the input consumed by the muxer, 0 before DEMUXING.
    #[must_use]
    pub fn demuxing_progress(&self) -> i32 {
        let total = self.phases.demux_total.load(Ordering::SeqCst);
        if total == 0 {
            return 0;
        }
        let read = self.phases.demux_read.load(Ordering::SeqCst);
        i32::try_from(read.saturating_mul(100) / total).unwrap_or(i32::MAX)
    }

    /// Tags that will be written into the output, without artwork.
    #[must_use]
    pub fn metadata(&self) -> MediaMetadata {
        self.phases.metadata_without_artwork()
    }
}

impl Transfer for YouTubeDownload {
    fn name(&self) -> String {
        self.inner.name()
    }

    fn display_name(&self) -> String {
        self.inner.display_name()
    }

    fn save_path(&self) -> PathBuf {
        self.inner.save_path()
    }

    fn temp_path(&self) -> Option<PathBuf> {
        Transfer::temp_path(self.inner.as_ref())
    }

    fn preview_file(&self) -> Option<PathBuf> {
        let fs = &self.inner.context().fs;
        if self.inner.is_complete() {
            Some(self.inner.save_path())
        } else if fs.exists(&self.phases.temp_video) {
            Some(self.phases.temp_video.clone())
        } else if fs.exists(&self.phases.temp_audio) {
            Some(self.phases.temp_audio.clone())
        } else {
            None
        }
    }

    fn size(&self) -> i64 {
        self.inner.size()
    }

    fn created(&self) -> SystemTime {
        self.inner.created()
    }

    fn state(&self) -> TransferState {
        self.inner.state()
    }

    fn bytes_received(&self) -> i64 {
        self.inner.bytes_received()
    }

    fn bytes_sent(&self) -> i64 {
        0
    }

    fn download_speed(&self) -> i64 {
        self.inner.download_speed()
    }

    fn upload_speed(&self) -> i64 {
        0
    }

    fn is_downloading(&self) -> bool {
        self.inner.is_downloading()
    }

    fn eta(&self) -> i64 {
        self.inner.eta()
    }

    fn progress(&self) -> i32 {
        self.inner.progress()
    }

    fn is_complete(&self) -> bool {
        self.inner.is_complete()
    }

    fn items(&self) -> Vec<TransferItem> {
        Vec::new()
    }

    fn remove(&self, delete_data: bool) {
        self.inner.remove(delete_data);
    }
}

/// Normalises the uploader label written as the author tag.
///
/// `"YouTube - Name"` becomes `"Name (YouTube)"`; otherwise the audio track's
/// uploader is used, falling back to the raw source label.
#[must_use]
pub fn normalize_author(source: Option<&str>, audio_user: Option<&str>) -> Option<String> {
    if let Some(name) = source.and_then(|s| s.strip_prefix(AUTHOR_PREFIX)) {
        return Some(format!("{name}{AUTHOR_SUFFIX}"));
    }
    if let Some(user) = audio_user {
        return Some(format!("{user}{AUTHOR_SUFFIX}"));
    }
    source.map(str::to_owned)
}
