//! In-memory collaborators for driving downloads without a network.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use transfers_core::download::{
    AudioTagger, AudioTags, HttpTransport, MediaMetadata, Muxer, SaveOutcome, TransferError,
    TransportError, TransportListener,
};
use transfers_core::{FileSystem, LocalFileSystem, TransferContext, WorkerPool};

/// Transport failure to replay for a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    DiskFull,
    Timeout,
    UnknownHost,
    NoNetwork,
    Status(u16),
}

impl Failure {
    fn to_error(self, url: &str, dest: &Path) -> TransportError {
        match self {
            Self::DiskFull => TransportError::DiskFull {
                path: dest.to_path_buf(),
            },
            Self::Timeout => TransportError::timeout(url),
            Self::UnknownHost => TransportError::UnknownHost { url: url.to_owned() },
            Self::NoNetwork => TransportError::NoNetwork { url: url.to_owned() },
            Self::Status(status) => TransportError::http_status(url, status),
        }
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Body(Vec<u8>),
    Fail(Failure),
}

/// [`HttpTransport`] that replays scripted bodies and failures per URL.
///
/// Bodies are written in `chunk_size` pieces with an optional delay between
/// them so tests can observe DOWNLOADING and cancel mid-transfer.
#[derive(Debug)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<String, Reply>>,
    fetches: Mutex<HashMap<String, Reply>>,
    chunk_size: usize,
    chunk_delay: Option<Duration>,
    saves: Mutex<Vec<String>>,
    cancelled: AtomicUsize,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            fetches: Mutex::new(HashMap::new()),
            chunk_size: 100,
            chunk_delay: None,
            saves: Mutex::new(Vec::new()),
            cancelled: AtomicUsize::new(0),
        }
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slows every chunk down by `delay`.
    pub fn with_chunk_delay(mut self, chunk_size: usize, delay: Duration) -> Self {
        self.chunk_size = chunk_size.max(1);
        self.chunk_delay = Some(delay);
        self
    }

    pub fn body(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_owned(), Reply::Body(body.into()));
        self
    }

    pub fn fail(self, url: &str, failure: Failure) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_owned(), Reply::Fail(failure));
        self
    }

    /// Scripts the response of `fetch_bytes` for `url`.
    pub fn fetch(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.fetches
            .lock()
            .unwrap()
            .insert(url.to_owned(), Reply::Body(body.into()));
        self
    }

    pub fn fetch_fail(self, url: &str, failure: Failure) -> Self {
        self.fetches
            .lock()
            .unwrap()
            .insert(url.to_owned(), Reply::Fail(failure));
        self
    }

    /// URLs passed to `save`, in call order.
    pub fn saves(&self) -> Vec<String> {
        self.saves.lock().unwrap().clone()
    }

    /// Number of `save` calls that stopped because the listener asked to.
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn save(
        &self,
        url: &str,
        dest: &Path,
        _resume: bool,
        listener: &dyn TransportListener,
    ) -> Result<SaveOutcome, TransportError> {
        self.saves.lock().unwrap().push(url.to_owned());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(Reply::Fail(Failure::Status(404)));

        let body = match reply {
            Reply::Body(body) => body,
            Reply::Fail(failure) => return Err(failure.to_error(url, dest)),
        };

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransportError::io(parent, e))?;
        }
        let mut written = Vec::with_capacity(body.len());
        for chunk in body.chunks(self.chunk_size) {
            if let Some(delay) = self.chunk_delay {
                tokio::time::sleep(delay).await;
            }
            written.extend_from_slice(chunk);
            tokio::fs::write(dest, &written)
                .await
                .map_err(|e| TransportError::io(dest, e))?;
            if listener.on_data(chunk).is_break() {
                self.cancelled.fetch_add(1, Ordering::SeqCst);
                return Ok(SaveOutcome::Cancelled);
            }
        }
        if body.is_empty() {
            tokio::fs::write(dest, b"")
                .await
                .map_err(|e| TransportError::io(dest, e))?;
        }
        Ok(SaveOutcome::Completed)
    }

    async fn fetch_bytes(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let reply = self.fetches.lock().unwrap().get(url).cloned();
        match reply {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Fail(failure)) => Err(failure.to_error(url, Path::new(""))),
            None => Err(TransportError::http_status(url, 404)),
        }
    }
}

/// Muxer that concatenates its inputs.
#[derive(Debug, Default)]
pub struct ConcatMuxer {
    pub fail: bool,
    pub seen: Mutex<Vec<MediaMetadata>>,
}

impl ConcatMuxer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn write(
        &self,
        inputs: &[&Path],
        output: &Path,
        metadata: &MediaMetadata,
        progress: &dyn Fn(u64),
    ) -> Result<(), TransferError> {
        self.seen.lock().unwrap().push(metadata.clone());
        if self.fail {
            return Err(TransferError::media(output, "corrupt container"));
        }
        let mut out = Vec::new();
        for input in inputs {
            let bytes = std::fs::read(input)
                .map_err(|e| TransferError::io("read", input.to_path_buf(), e))?;
            progress(bytes.len() as u64);
            out.extend_from_slice(&bytes);
        }
        std::fs::write(output, out).map_err(|e| TransferError::io("write", output, e))
    }
}

impl Muxer for ConcatMuxer {
    fn demux_audio(
        &self,
        input: &Path,
        output: &Path,
        metadata: &MediaMetadata,
        progress: &dyn Fn(u64),
    ) -> Result<(), TransferError> {
        self.write(&[input], output, metadata, progress)
    }

    fn mux(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        metadata: &MediaMetadata,
        progress: &dyn Fn(u64),
    ) -> Result<(), TransferError> {
        self.write(&[video, audio], output, metadata, progress)
    }
}

/// Tagger that prefixes the file with the artwork bytes.
#[derive(Debug, Default)]
pub struct PrefixTagger {
    pub fail: bool,
    pub calls: Mutex<Vec<AudioTags>>,
}

impl AudioTagger for PrefixTagger {
    fn embed_artwork(
        &self,
        input: &Path,
        output: &Path,
        artwork: &[u8],
        tags: &AudioTags,
    ) -> Result<(), TransferError> {
        self.calls.lock().unwrap().push(tags.clone());
        if self.fail {
            std::fs::write(output, b"partial").map_err(|e| TransferError::io("write", output, e))?;
            return Err(TransferError::media(input, "unsupported audio file"));
        }
        let mut out = artwork.to_vec();
        out.extend(std::fs::read(input).map_err(|e| TransferError::io("read", input, e))?);
        std::fs::write(output, out).map_err(|e| TransferError::io("write", output, e))
    }
}

/// Save and temp directories under one temp root.
pub struct Dirs {
    pub root: TempDir,
    pub save: PathBuf,
    pub temp: PathBuf,
}

impl Dirs {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let save = root.path().join("save");
        let temp = root.path().join("temp");
        Self { root, save, temp }
    }
}

/// Local filesystem whose `copy` stalls after reading the source, leaving a
/// window to cancel while the move is in flight.
#[derive(Debug)]
pub struct SlowCopyFs {
    delay: Duration,
    started: AtomicBool,
    finished: AtomicBool,
}

impl SlowCopyFs {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        }
    }

    pub fn copy_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn copy_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl FileSystem for SlowCopyFs {
    fn exists(&self, path: &Path) -> bool {
        LocalFileSystem.exists(path)
    }

    fn is_directory(&self, path: &Path) -> bool {
        LocalFileSystem.is_directory(path)
    }

    fn mkdirs(&self, path: &Path) -> bool {
        LocalFileSystem.mkdirs(path)
    }

    fn delete(&self, path: &Path) -> bool {
        LocalFileSystem.delete(path)
    }

    fn rename(&self, src: &Path, dst: &Path) -> bool {
        LocalFileSystem.rename(src, dst)
    }

    fn copy(&self, src: &Path, dst: &Path) -> bool {
        let Ok(bytes) = std::fs::read(src) else {
            return false;
        };
        self.started.store(true, Ordering::SeqCst);
        // Runs on a blocking thread
        std::thread::sleep(self.delay);
        let written = std::fs::write(dst, bytes).is_ok();
        self.finished.store(true, Ordering::SeqCst);
        written
    }

    fn scan(&self, path: &Path) {
        LocalFileSystem.scan(path);
    }

    fn len(&self, path: &Path) -> u64 {
        LocalFileSystem.len(path)
    }
}

/// Context using the local filesystem and a small pool.
pub fn context(transport: Arc<ScriptedTransport>) -> TransferContext {
    context_with_fs(transport, Arc::new(LocalFileSystem))
}

pub fn context_with_fs(
    transport: Arc<ScriptedTransport>,
    fs: Arc<dyn FileSystem>,
) -> TransferContext {
    TransferContext {
        transport,
        fs,
        pool: WorkerPool::new("test-pool", 4).unwrap(),
    }
}
