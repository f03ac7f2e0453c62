//! HTTP downloads driven by the transfer state machine.
//!
//! This module provides [`HttpDownload`], which fetches a URL into a temp file
//! through an [`HttpTransport`], tracks its speed and progress, and finishes by
//! moving the file into the save directory.
//!
//! # Features
//!
//! - Pluggable transport ([`ReqwestTransport`] streams with `reqwest`)
//! - Bounded worker pool, cooperative cancellation via `remove()`
//! - Error classification into terminal `ERROR*` states
//! - Collision-free filenames (`name (1).ext`, `name (2).ext`, ...)
//! - YouTube (DASH/demux) and SoundCloud (cover art) specialisations
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use transfers_core::download::{HttpDownload, ReqwestTransport, TransferContext};
//! use transfers_core::platform::{LocalFileSystem, WorkerPool};
//! use transfers_core::transfer::TransferDescriptor;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let context = TransferContext {
//!     transport: Arc::new(ReqwestTransport::new()?),
//!     fs: Arc::new(LocalFileSystem),
//!     pool: WorkerPool::new("http-download", 20)?,
//! };
//! let descriptor = TransferDescriptor::new("https://example.com/a.mp3", "a.mp3", "A", 0);
//! let download = HttpDownload::plain(descriptor, Path::new("./music"), Path::new("./tmp"), context);
//! download.start();
//! let state = download.wait_until_complete().await;
//! println!("finished: {state}");
//! # Ok(())
//! # }
//! ```

mod classify;
mod client;
mod constants;
mod error;
mod filename;
mod http;
mod phases;
pub mod soundcloud;
mod transport;
pub mod youtube;

pub use classify::classify;
pub use client::ReqwestTransport;
pub use constants::{
    ARTWORK_TIMEOUT, CONNECT_TIMEOUT_SECS, HTTP_POOL_NAME, MAX_COVER_ART_FILE_SIZE,
    MAX_NAME_ATTEMPTS, READ_TIMEOUT_SECS,
};
pub use error::{TransferError, TransportError};
pub use filename::{build_file, cleanup_filename, filename_from_url};
pub use http::{HttpDownload, LifecycleStatus, TransferContext};
pub use phases::{BasePhases, DownloadPhases, MoveOnFinish};
pub use soundcloud::{AudioTagger, AudioTags, SoundcloudTrack, soundcloud_download};
pub use transport::{HttpTransport, SaveOutcome, TransportListener};
pub use youtube::{DownloadType, MediaMetadata, MediaTrack, Muxer, YouTubeDownload, YouTubeSource};

// No module-local Result aliases; spell out `Result<T, TransferError>`.
