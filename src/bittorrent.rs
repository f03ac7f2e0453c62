//! BitTorrent capability on top of [`Transfer`].
//!
//! The torrent engine is external; it exposes its downloads through
//! [`BittorrentDownload`] so they can sit in the same transfer list as HTTP
//! downloads.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::transfer::Transfer;

/// Extension reported when a torrent's file list is not known yet.
pub const UNKNOWN_TORRENT_EXTENSION: &str = "torrent";

/// One file inside a torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentFile {
    pub path: PathBuf,
    pub size: i64,
}

/// A torrent download as reported by the engine.
pub trait BittorrentDownload: Transfer {
    /// Returns `self` as a plain transfer.
    fn as_transfer(&self) -> &dyn Transfer;

    /// Hex info hash; the key the manager stores torrents under.
    fn info_hash(&self) -> String;

    fn magnet_uri(&self) -> Option<String>;

    fn connected_peers(&self) -> u32;

    fn total_peers(&self) -> u32;

    fn connected_seeds(&self) -> u32;

    fn total_seeds(&self) -> u32;

    fn is_paused(&self) -> bool;

    fn is_seeding(&self) -> bool;

    /// True once every wanted piece is on disk.
    fn is_finished(&self) -> bool;

    fn pause(&self);

    fn resume(&self);

    /// Removes the torrent from the engine, optionally deleting the .torrent
    /// file and the downloaded data.
    fn remove_torrent(&self, delete_torrent: bool, delete_data: bool);

    /// Files in the torrent; `None` until metadata is available.
    fn files(&self) -> Option<Vec<TorrentFile>>;

    /// Extension that accounts for the most bytes in the torrent.
    fn predominant_file_extension(&self) -> String {
        predominant_file_extension(self.files().as_deref())
    }
}

/// Sums file sizes per lowercase extension and returns the largest.
///
/// Files without an extension are ignored. Returns
/// [`UNKNOWN_TORRENT_EXTENSION`] when there is nothing to count; ties go to
/// the alphabetically first extension.
#[must_use]
pub fn predominant_file_extension(files: Option<&[TorrentFile]>) -> String {
    let Some(files) = files else {
        return UNKNOWN_TORRENT_EXTENSION.to_owned();
    };

    let mut totals: HashMap<String, i64> = HashMap::new();
    for file in files {
        if let Some(ext) = file.path.extension().and_then(|e| e.to_str()) {
            *totals.entry(ext.to_ascii_lowercase()).or_default() += file.size.max(0);
        }
    }

    totals
        .into_iter()
        .max_by(|(a_ext, a_size), (b_ext, b_size)| a_size.cmp(b_size).then(b_ext.cmp(a_ext)))
        .map_or_else(|| UNKNOWN_TORRENT_EXTENSION.to_owned(), |(ext, _)| ext)
}
