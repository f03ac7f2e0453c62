//! Integration tests for the reqwest transport against a mock server.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::header::HeaderMap;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use transfers_core::download::{
    HttpTransport, ReqwestTransport, SaveOutcome, TransportError, TransportListener,
};
use transfers_core::{
    HttpDownload, LocalFileSystem, Transfer, TransferContext, TransferDescriptor, TransferState,
    WorkerPool,
};

mod support;
use support::socket_guard::start_mock_server_or_skip;
use support::wait_latched;

/// Counts bytes and optionally stops after the first chunk.
#[derive(Default)]
struct Recorder {
    bytes: AtomicUsize,
    headers_seen: AtomicUsize,
    stop_after_first: bool,
}

impl TransportListener for Recorder {
    fn on_headers(&self, _headers: &HeaderMap) {
        self.headers_seen.fetch_add(1, Ordering::SeqCst);
    }

    fn on_data(&self, chunk: &[u8]) -> ControlFlow<()> {
        self.bytes.fetch_add(chunk.len(), Ordering::SeqCst);
        if self.stop_after_first {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

#[tokio::test]
async fn test_save_writes_body_and_reports_bytes() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = tempfile::TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/song.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![5u8; 2048]))
        .expect(1)
        .mount(&mock_server)
        .await;

    let transport = ReqwestTransport::new().unwrap();
    let listener = Recorder::default();
    let dest = temp_dir.path().join("nested").join("song.mp3");
    let url = format!("{}/song.mp3", mock_server.uri());

    let outcome = transport.save(&url, &dest, false, &listener).await.unwrap();

    assert_eq!(outcome, SaveOutcome::Completed);
    assert_eq!(std::fs::read(&dest).unwrap(), vec![5u8; 2048]);
    assert_eq!(listener.bytes.load(Ordering::SeqCst), 2048);
    assert_eq!(listener.headers_seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_save_error_status_is_typed() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = tempfile::TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let transport = ReqwestTransport::new().unwrap();
    let url = format!("{}/missing", mock_server.uri());
    let err = transport
        .save(&url, &temp_dir.path().join("x"), false, &Recorder::default())
        .await
        .unwrap_err();

    assert!(
        matches!(err, TransportError::HttpStatus { status: 404, .. }),
        "unexpected error: {err:?}"
    );
    assert!(!temp_dir.path().join("x").exists());
}

#[tokio::test]
async fn test_resume_requests_range_and_appends() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = tempfile::TempDir::new().unwrap();
    let dest = temp_dir.path().join("part.bin");
    std::fs::write(&dest, b"abc").unwrap();

    Mock::given(method("GET"))
        .and(path("/part.bin"))
        .and(header("range", "bytes=3-"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(b"def".to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let transport = ReqwestTransport::new().unwrap();
    let url = format!("{}/part.bin", mock_server.uri());
    let outcome = transport
        .save(&url, &dest, true, &Recorder::default())
        .await
        .unwrap();

    assert_eq!(outcome, SaveOutcome::Completed);
    assert_eq!(std::fs::read(&dest).unwrap(), b"abcdef");
}

#[tokio::test]
async fn test_resume_rewrites_when_server_ignores_range() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = tempfile::TempDir::new().unwrap();
    let dest = temp_dir.path().join("part.bin");
    std::fs::write(&dest, b"stale").unwrap();

    Mock::given(method("GET"))
        .and(path("/part.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fresh body".to_vec()))
        .mount(&mock_server)
        .await;

    let transport = ReqwestTransport::new().unwrap();
    let url = format!("{}/part.bin", mock_server.uri());
    transport
        .save(&url, &dest, true, &Recorder::default())
        .await
        .unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), b"fresh body");
}

#[tokio::test]
async fn test_listener_break_cancels_save() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = tempfile::TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/big.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 64 * 1024]))
        .mount(&mock_server)
        .await;

    let transport = ReqwestTransport::new().unwrap();
    let listener = Recorder {
        stop_after_first: true,
        ..Recorder::default()
    };
    let url = format!("{}/big.bin", mock_server.uri());
    let outcome = transport
        .save(&url, &temp_dir.path().join("big.bin"), false, &listener)
        .await
        .unwrap();

    assert_eq!(outcome, SaveOutcome::Cancelled);
    assert!(listener.bytes.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn test_fetch_bytes_returns_body() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/art.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg".to_vec()))
        .mount(&mock_server)
        .await;

    let transport = ReqwestTransport::new().unwrap();
    let url = format!("{}/art.jpg", mock_server.uri());
    let body = transport
        .fetch_bytes(&url, Duration::from_secs(3))
        .await
        .unwrap();

    assert_eq!(body, b"jpeg");
}

#[tokio::test]
async fn test_slow_fetch_bytes_times_out() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/slow.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"jpeg".to_vec())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let transport = ReqwestTransport::new().unwrap();
    let url = format!("{}/slow.jpg", mock_server.uri());
    let err = transport
        .fetch_bytes(&url, Duration::from_millis(100))
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Timeout { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_http_download_end_to_end() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = tempfile::TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/files/report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![9u8; 1000]))
        .expect(1)
        .mount(&mock_server)
        .await;

    let context = TransferContext {
        transport: Arc::new(ReqwestTransport::new().unwrap()),
        fs: Arc::new(LocalFileSystem),
        pool: WorkerPool::new("http-download", 2).unwrap(),
    };
    let url = format!("{}/files/report.pdf", mock_server.uri());
    let download = HttpDownload::plain(
        TransferDescriptor::new(url, "", "Report", 1000),
        &temp_dir.path().join("save"),
        &temp_dir.path().join("temp"),
        context,
    );

    download.start();

    assert_eq!(wait_latched(&download).await, TransferState::Complete);
    assert_eq!(download.bytes_received(), 1000);
    assert_eq!(
        std::fs::read(temp_dir.path().join("save").join("report.pdf")).unwrap(),
        vec![9u8; 1000]
    );
}

#[tokio::test]
async fn test_http_download_server_error_latches_error() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = tempfile::TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let context = TransferContext {
        transport: Arc::new(ReqwestTransport::new().unwrap()),
        fs: Arc::new(LocalFileSystem),
        pool: WorkerPool::new("http-download", 2).unwrap(),
    };
    let download = HttpDownload::plain(
        TransferDescriptor::new(format!("{}/x.bin", mock_server.uri()), "x.bin", "X", 0),
        &temp_dir.path().join("save"),
        &temp_dir.path().join("temp"),
        context,
    );

    download.start();

    assert_eq!(wait_latched(&download).await, TransferState::Error);
}
