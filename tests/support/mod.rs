//! Shared helpers for integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

pub mod fakes;
pub mod socket_guard;

use std::time::Duration;

use transfers_core::{HttpDownload, TransferState};

/// Waits for the download to latch, failing the test after five seconds.
pub async fn wait_latched(download: &HttpDownload) -> TransferState {
    tokio::time::timeout(Duration::from_secs(5), download.wait_until_complete())
        .await
        .expect("download should latch within 5s")
}

/// Waits until the download reports `state`.
pub async fn wait_for_state(download: &HttpDownload, state: TransferState) {
    let mut rx = download.subscribe();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.state == state))
        .await
        .expect("state should be reached within 5s")
        .expect("status channel closed");
}
