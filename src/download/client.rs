//! `reqwest`-backed [`HttpTransport`].
//!
//! Bodies are streamed straight to disk. Resuming sends a `Range` header for
//! the bytes already present and appends when the server answers 206.

use std::ops::ControlFlow;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::RANGE;
use reqwest::{Client, StatusCode};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::TransportError;
use super::transport::{HttpTransport, SaveOutcome, TransportListener};
use crate::user_agent;

/// HTTP transport built on a shared `reqwest` client.
///
/// Create once and share; the underlying client pools connections.
///
/// # Example
///
/// ```no_run
/// use transfers_core::download::ReqwestTransport;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = ReqwestTransport::with_timeouts(10, 120)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a transport with the default timeouts (30s connect, 5min read).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ClientBuild`] if the TLS backend cannot be
    /// initialised.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a transport with explicit timeouts in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ClientBuild`] if the TLS backend cannot be
    /// initialised.
    pub fn with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_transfer_user_agent())
            .build()
            .map_err(|e| TransportError::ClientBuild {
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip(self, listener), fields(url = %url, dest = %dest.display()))]
    async fn save(
        &self,
        url: &str,
        dest: &Path,
        resume: bool,
        listener: &dyn TransportListener,
    ) -> Result<SaveOutcome, TransportError> {
        Url::parse(url).map_err(|_| TransportError::invalid_url(url))?;

        let existing_bytes = if resume {
            tokio::fs::metadata(dest)
                .await
                .map(|meta| meta.len())
                .unwrap_or(0)
        } else {
            0
        };

        let mut request = self.client.get(url);
        if existing_bytes > 0 {
            request = request.header(RANGE, format!("bytes={existing_bytes}-"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::http_status(url, status.as_u16()));
        }
        listener.on_headers(response.headers());

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransportError::io(parent, e))?;
        }

        let append = existing_bytes > 0 && status == StatusCode::PARTIAL_CONTENT;
        let file = if append {
            OpenOptions::new().create(true).append(true).open(dest).await
        } else {
            File::create(dest).await
        }
        .map_err(|e| TransportError::io(dest, e))?;
        debug!(append, existing_bytes, status = status.as_u16(), "streaming body");

        stream_to_file(file, response, url, dest, listener).await
    }

    #[instrument(skip(self), fields(url = %url))]
    async fn fetch_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        Url::parse(url).map_err(|_| TransportError::invalid_url(url))?;

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url, &e))?;
        if !response.status().is_success() {
            return Err(TransportError::http_status(url, response.status().as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(url, &e))?;
        Ok(body.to_vec())
    }
}

/// Streams the response body into `file`, reporting every chunk.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    listener: &dyn TransportListener,
) -> Result<SaveOutcome, TransportError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut outcome = SaveOutcome::Completed;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| TransportError::from_reqwest(url, &e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| TransportError::io(file_path, e))?;

        if listener.on_data(&chunk) == ControlFlow::Break(()) {
            debug!("listener stopped transfer");
            outcome = SaveOutcome::Cancelled;
            break;
        }
    }

    // Flush even when cancelled so the partial file can be resumed
    writer
        .flush()
        .await
        .map_err(|e| TransportError::io(file_path, e))?;

    Ok(outcome)
}
