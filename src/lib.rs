//! FrostWire Transfers Core Library
//!
//! Lifecycle model for the transfer list of a file-sharing client: HTTP and
//! BitTorrent downloads share one [`Transfer`] surface, move through
//! [`TransferState`] values and report speed, ETA and progress from a
//! rolling-window [`SpeedStat`].
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`transfer`] - States, speed estimation, the `Transfer` trait and the manager
//! - [`download`] - HTTP download state machine, transport, YouTube/SoundCloud
//! - [`bittorrent`] - Capability trait for engine-provided torrent downloads
//! - [`platform`] - Filesystem abstraction and the bounded worker pool
//! - [`config`] - TOML configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bittorrent;
pub mod config;
pub mod download;
pub mod platform;
pub mod transfer;
mod user_agent;

// Re-export commonly used types
pub use bittorrent::{BittorrentDownload, TorrentFile, predominant_file_extension};
pub use config::{ConfigError, LoadedConfig, TransferConfig, load_default_config};
pub use download::{
    HttpDownload, HttpTransport, ReqwestTransport, TransferContext, TransferError, TransportError,
};
pub use platform::{FileSystem, LocalFileSystem, PoolError, WorkerPool};
pub use transfer::{
    CompletionListener, SpeedStat, Transfer, TransferDescriptor, TransferManager,
    TransferSnapshot, TransferState,
};
