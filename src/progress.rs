//! Progress bar for a single download run.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use transfers_core::{HttpDownload, Transfer};

const REFRESH_INTERVAL: Duration = Duration::from_millis(120);

/// Spawns the progress bar when requested.
///
/// The task ends on its own once the download latched. Returns `None` when
/// `enabled` is false.
pub(crate) fn spawn_progress_ui(
    enabled: bool,
    download: Arc<HttpDownload>,
) -> Option<tokio::task::JoinHandle<()>> {
    if !enabled {
        return None;
    }
    Some(tokio::spawn(run_progress_bar(download)))
}

async fn run_progress_bar(download: Arc<HttpDownload>) {
    let known_size = u64::try_from(download.size()).ok().filter(|size| *size > 0);
    let bar = match known_size {
        Some(size) => {
            let bar = ProgressBar::new(size);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner} {msg} [{bar:30}] {bytes}/{total_bytes} ({binary_bytes_per_sec}, eta {eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
            );
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner} {msg} {bytes} ({binary_bytes_per_sec})")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar
        }
    };
    bar.enable_steady_tick(Duration::from_millis(100));

    let mut status = download.subscribe();
    loop {
        let state = download.state();
        bar.set_message(format!("{} [{state}]", download.display_name()));
        bar.set_position(u64::try_from(download.bytes_received()).unwrap_or(0));
        if download.is_complete() {
            break;
        }
        // Wake on the next state change or the next refresh tick.
        let _ = tokio::time::timeout(REFRESH_INTERVAL, status.changed()).await;
    }

    bar.finish_and_clear();
}

#[cfg(test)]
mod tests {
    use super::spawn_progress_ui;
    use std::sync::Arc;
    use tempfile::TempDir;
    use transfers_core::{
        HttpDownload, LocalFileSystem, ReqwestTransport, Transfer, TransferContext,
        TransferDescriptor, WorkerPool,
    };

    fn download(dir: &TempDir) -> Arc<HttpDownload> {
        let context = TransferContext {
            transport: Arc::new(ReqwestTransport::new().unwrap()),
            fs: Arc::new(LocalFileSystem),
            pool: WorkerPool::new("test", 1).unwrap(),
        };
        HttpDownload::plain(
            TransferDescriptor::new("http://localhost/f.bin", "f.bin", "f.bin", 10),
            &dir.path().join("save"),
            &dir.path().join("temp"),
            context,
        )
    }

    #[tokio::test]
    async fn spawn_progress_ui_when_disabled_returns_none() {
        let dir = TempDir::new().unwrap();
        assert!(spawn_progress_ui(false, download(&dir)).is_none());
    }

    #[tokio::test]
    async fn progress_task_ends_once_download_latched() {
        let dir = TempDir::new().unwrap();
        let download = download(&dir);

        let handle = spawn_progress_ui(true, Arc::clone(&download)).unwrap();
        download.remove(false);

        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("progress task should stop after cancel")
            .unwrap();
    }
}
