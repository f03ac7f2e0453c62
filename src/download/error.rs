//! Error types for HTTP transfers.
//!
//! [`TransportError`] carries the typed cause reported by an
//! [`HttpTransport`](super::HttpTransport); [`TransferError`] covers everything
//! a download can fail with, including post-processing. Neither leaves the
//! crate as a return value of the state machine: both are classified into a
//! terminal [`TransferState`](crate::transfer::TransferState).

use std::error::Error as _;
use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by an HTTP transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connect or read timed out.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// TLS handshake or certificate failure.
    #[error("TLS error downloading {url}: {message}")]
    Tls {
        /// The URL being fetched.
        url: String,
        /// Description from the TLS layer.
        message: String,
    },

    /// Host name could not be resolved.
    #[error("unknown host for {url}")]
    UnknownHost {
        /// The URL whose host did not resolve.
        url: String,
    },

    /// No network route is available.
    #[error("no network available for {url}")]
    NoNetwork {
        /// The URL being fetched.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Destination disk ran out of space.
    #[error("disk full writing to {path}")]
    DiskFull {
        /// The file being written.
        path: PathBuf,
    },

    /// File system error while writing the body.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {message}")]
    ClientBuild {
        /// Description from the client builder.
        message: String,
    },

    /// Any other transport failure.
    #[error("network error downloading {url}: {message}")]
    Other {
        /// The URL being fetched.
        url: String,
        /// Description of the failure.
        message: String,
    },
}

impl TransportError {
    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an IO error, promoting out-of-space failures to [`Self::DiskFull`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        if is_storage_full(&source) {
            Self::DiskFull { path: path.into() }
        } else {
            Self::Io {
                path: path.into(),
                source,
            }
        }
    }

    /// Creates a catch-all error.
    pub fn other(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Other {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Maps a reqwest failure to a typed cause.
    ///
    /// reqwest does not expose DNS or TLS failures as kinds, so the source
    /// chain text is inspected for those.
    pub fn from_reqwest(url: impl Into<String>, err: &reqwest::Error) -> Self {
        let url = url.into();
        if err.is_timeout() {
            return Self::Timeout { url };
        }

        let chain = error_chain_text(err);
        let lower = chain.to_ascii_lowercase();
        if lower.contains("dns")
            || lower.contains("failed to lookup address")
            || lower.contains("name or service not known")
            || lower.contains("no such host")
        {
            Self::UnknownHost { url }
        } else if lower.contains("certificate") || lower.contains("tls") || lower.contains("ssl")
        {
            Self::Tls {
                url,
                message: chain,
            }
        } else if lower.contains("network is unreachable") {
            Self::NoNetwork { url }
        } else if lower.contains("connection timed out") {
            Self::Timeout { url }
        } else {
            Self::Other {
                url,
                message: chain,
            }
        }
    }
}

/// Errors a download can fail with.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Local file operation failed.
    #[error("failed to {action} {path}: {source}")]
    Io {
        /// What was being attempted, e.g. "rename".
        action: &'static str,
        /// The file involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Muxing, demuxing or tagging failed.
    #[error("media processing failed for {path}: {message}")]
    Media {
        /// The file being processed.
        path: PathBuf,
        /// Description from the media tool.
        message: String,
    },

    /// A completion hook failed.
    #[error("completion hook failed: {message}")]
    Completion {
        /// Description of the failure.
        message: String,
    },

    /// A blocking job panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// The download could not be constructed from its inputs.
    #[error("invalid download: {reason}")]
    InvalidDescriptor {
        /// Why the inputs were rejected.
        reason: String,
    },
}

impl TransferError {
    /// Creates an IO error.
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Creates a media processing error.
    pub fn media(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Media {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a completion hook error.
    pub fn completion(message: impl Into<String>) -> Self {
        Self::Completion {
            message: message.into(),
        }
    }

    /// Creates an invalid descriptor error.
    pub fn invalid_descriptor(reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            reason: reason.into(),
        }
    }
}

pub(crate) fn is_storage_full(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::StorageFull
        || err.to_string().contains("No space left on device")
}

fn error_chain_text(err: &reqwest::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
