//! Constants for HTTP transfers (timeouts, naming, media limits).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Upper bound for the `" (N)"` counter when picking a free filename.
pub const MAX_NAME_ATTEMPTS: u32 = 30;

/// Timeout for small side downloads such as cover art.
pub const ARTWORK_TIMEOUT: Duration = Duration::from_secs(3);

/// Files above this size (20 MiB) are moved without embedding cover art.
pub const MAX_COVER_ART_FILE_SIZE: u64 = 20_971_520;

/// Pool name used for HTTP download jobs.
pub const HTTP_POOL_NAME: &str = "http-download";
