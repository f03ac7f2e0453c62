//! SoundCloud downloads: a plain HTTP download that embeds cover art before
//! the file is moved into place.

use std::ffi::OsString;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::constants::{ARTWORK_TIMEOUT, MAX_COVER_ART_FILE_SIZE};
use super::error::TransferError;
use super::http::{HttpDownload, TransferContext};
use super::phases::DownloadPhases;
use crate::platform::FileSystem;
use crate::transfer::TransferDescriptor;

/// A SoundCloud search result to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundcloudTrack {
    pub url: String,
    pub filename: String,
    pub display_name: String,
    pub size: i64,
    pub thumbnail_url: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Page the track was found on.
    pub details_url: Option<String>,
}

/// ID3 fields written alongside the artwork.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioTags {
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub url: Option<String>,
}

/// Writes artwork and tags into an audio file.
pub trait AudioTagger: Send + Sync + Debug {
    /// Reads `input` and writes a tagged copy to `output`. Blocking.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Media`] when the file cannot be parsed or written.
    fn embed_artwork(
        &self,
        input: &Path,
        output: &Path,
        artwork: &[u8],
        tags: &AudioTags,
    ) -> Result<(), TransferError>;
}

#[derive(Debug)]
struct SoundcloudPhases {
    thumbnail_url: Option<String>,
    tags: AudioTags,
    tagger: Arc<dyn AudioTagger>,
}

impl SoundcloudPhases {
    /// Best-effort: every failure is logged and the untagged file kept.
    async fn embed_cover_art(&self, download: &HttpDownload) {
        let Some(url) = self.thumbnail_url.as_deref() else {
            return;
        };
        let fs = Arc::clone(&download.context().fs);
        let temp = download.temp_file().to_path_buf();
        if !fs.exists(&temp) || fs.len(&temp) > MAX_COVER_ART_FILE_SIZE {
            debug!(path = %temp.display(), "skipping cover art");
            return;
        }

        let artwork = match download
            .context()
            .transport
            .fetch_bytes(url, ARTWORK_TIMEOUT)
            .await
        {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return,
            Err(e) => {
                warn!(url, error = %e, "failed to fetch cover art");
                return;
            }
        };

        let staged = staged_path(&temp);
        if !fs.rename(&temp, &staged) {
            warn!(path = %temp.display(), "failed to stage file for tagging");
            return;
        }

        let tagger = Arc::clone(&self.tagger);
        let tags = self.tags.clone();
        let (input, output) = (staged.clone(), temp.clone());
        let tagged = tokio::task::spawn_blocking(move || {
            tagger.embed_artwork(&input, &output, &artwork, &tags)
        })
        .await;

        match tagged {
            Ok(Ok(())) => {
                if !fs.delete(&staged) {
                    warn!(path = %staged.display(), "failed to delete staged file");
                }
            }
            Ok(Err(e)) => {
                warn!(path = %temp.display(), error = %e, "failed to embed cover art");
                restore(fs.as_ref(), &staged, &temp);
            }
            Err(e) => {
                warn!(path = %temp.display(), error = %e, "cover art task failed");
                restore(fs.as_ref(), &staged, &temp);
            }
        }
    }
}

#[async_trait]
impl DownloadPhases for SoundcloudPhases {
    async fn on_finishing(&self, download: &Arc<HttpDownload>) -> Result<(), TransferError> {
        self.embed_cover_art(download).await;
        download
            .move_and_complete(download.temp_file(), download.save_file())
            .await
    }
}

/// Creates a SoundCloud download in WAITING.
pub fn soundcloud_download(
    track: SoundcloudTrack,
    save_dir: &Path,
    temp_dir: &Path,
    context: TransferContext,
    tagger: Arc<dyn AudioTagger>,
) -> Arc<HttpDownload> {
    let descriptor = TransferDescriptor::new(
        track.url,
        track.filename,
        track.display_name.clone(),
        track.size,
    );
    let phases = SoundcloudPhases {
        thumbnail_url: track.thumbnail_url,
        tags: AudioTags {
            title: track.display_name,
            artist: track.artist,
            album: track.album,
            url: track.details_url,
        },
        tagger,
    };
    HttpDownload::new(descriptor, save_dir, temp_dir, context, Arc::new(phases))
}

fn staged_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn restore(fs: &dyn FileSystem, staged: &Path, original: &Path) {
    // A failed tagger may have left a partial output behind
    if !fs.delete(original) {
        warn!(path = %original.display(), "failed to delete partial tagged file");
    }
    if !fs.rename(staged, original) {
        warn!(path = %original.display(), "failed to restore untagged file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_path_appends_suffix() {
        assert_eq!(
            staged_path(Path::new("/tmp/song.mp3")),
            PathBuf::from("/tmp/song.mp3.tmp")
        );
    }
}
