//! Transport seam between the download state machine and an HTTP client.

use std::fmt::Debug;
use std::ops::ControlFlow;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;

use super::error::TransportError;

/// How a successful `save` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The whole body was written.
    Completed,
    /// The listener asked to stop; the partial file is left in place.
    Cancelled,
}

/// Receives progress from a running transport.
pub trait TransportListener: Send + Sync {
    /// Called once with the response headers, before any data.
    fn on_headers(&self, _headers: &HeaderMap) {}

    /// Called for every chunk after it has been written.
    ///
    /// Returning [`ControlFlow::Break`] makes the transport stop and report
    /// [`SaveOutcome::Cancelled`].
    fn on_data(&self, chunk: &[u8]) -> ControlFlow<()>;
}

/// Downloads a URL into a file.
#[async_trait]
pub trait HttpTransport: Send + Sync + Debug {
    /// Streams `url` into `dest`.
    ///
    /// With `resume` set and `dest` already present, the transport requests
    /// the remaining range and appends.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] describing the typed cause of the failure.
    async fn save(
        &self,
        url: &str,
        dest: &Path,
        resume: bool,
        listener: &dyn TransportListener,
    ) -> Result<SaveOutcome, TransportError>;

    /// Fetches a small body into memory.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the request fails or exceeds `timeout`.
    async fn fetch_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, TransportError>;
}
