//! Filesystem abstraction used by transfers.
//!
//! Every operation is best-effort and reports success as a boolean; callers
//! decide which failures turn into error states.

use std::fmt::Debug;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, warn};

/// Narrow filesystem surface consumed by the transfer state machine.
pub trait FileSystem: Send + Sync + Debug {
    fn exists(&self, path: &Path) -> bool;

    fn is_directory(&self, path: &Path) -> bool;

    /// Creates `path` and its parents. An existing directory counts as success.
    fn mkdirs(&self, path: &Path) -> bool;

    /// Deletes a file. A missing file counts as success.
    fn delete(&self, path: &Path) -> bool;

    /// Renames `src` to `dst` on the same volume, replacing `dst`.
    fn rename(&self, src: &Path, dst: &Path) -> bool;

    /// Copies `src` to `dst`, replacing `dst`.
    fn copy(&self, src: &Path, dst: &Path) -> bool;

    /// Notifies the media index that `path` changed.
    fn scan(&self, path: &Path);

    /// File length in bytes, 0 when the file cannot be read.
    fn len(&self, path: &Path) -> u64;
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_directory(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn mkdirs(&self, path: &Path) -> bool {
        match std::fs::create_dir_all(path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => path.is_dir(),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "failed to create directory");
                false
            }
        }
    }

    fn delete(&self, path: &Path) -> bool {
        match std::fs::remove_file(path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "failed to delete file");
                false
            }
        }
    }

    fn rename(&self, src: &Path, dst: &Path) -> bool {
        match std::fs::rename(src, dst) {
            Ok(()) => true,
            Err(e) => {
                debug!(
                    src = %src.display(),
                    dst = %dst.display(),
                    error = %e,
                    "failed to rename file"
                );
                false
            }
        }
    }

    fn copy(&self, src: &Path, dst: &Path) -> bool {
        if let Some(parent) = dst.parent() {
            if !parent.as_os_str().is_empty() && !self.mkdirs(parent) {
                return false;
            }
        }
        match std::fs::copy(src, dst) {
            Ok(_) => true,
            Err(e) => {
                warn!(
                    src = %src.display(),
                    dst = %dst.display(),
                    error = %e,
                    "failed to copy file"
                );
                false
            }
        }
    }

    fn scan(&self, path: &Path) {
        debug!(path = %path.display(), "file ready for media scan");
    }

    fn len(&self, path: &Path) -> u64 {
        std::fs::metadata(path).map(|meta| meta.len()).unwrap_or(0)
    }
}
