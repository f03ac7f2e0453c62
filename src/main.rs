//! CLI entry point for the transfer tool.

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};
use transfers_core::download::{HTTP_POOL_NAME, filename_from_url};
use transfers_core::{
    HttpDownload, LocalFileSystem, ReqwestTransport, Transfer, TransferContext,
    TransferDescriptor, TransferManager, TransferSnapshot, WorkerPool, load_default_config,
};

mod cli;
mod progress;

use cli::Args;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let loaded = load_default_config().context("failed to load configuration")?;
    if loaded.loaded_from_file {
        debug!(path = ?loaded.path, "using config file");
    }
    let mut config = loaded.config;
    if let Some(dir) = args.save_dir.clone() {
        config.save_dir = dir;
    }
    if let Some(dir) = args.temp_dir.clone() {
        config.temp_dir = dir;
    }

    let transport =
        ReqwestTransport::with_timeouts(config.connect_timeout_secs, config.read_timeout_secs)
            .context("failed to build HTTP client")?;
    let context = TransferContext {
        transport: Arc::new(transport),
        fs: Arc::new(LocalFileSystem),
        pool: WorkerPool::new(HTTP_POOL_NAME, config.max_concurrent_transfers)?,
    };

    let filename = args
        .filename
        .clone()
        .or_else(|| filename_from_url(&args.url))
        .unwrap_or_default();
    let display_name = args.display_name.clone().unwrap_or_else(|| filename.clone());
    let descriptor = TransferDescriptor::new(&args.url, filename, display_name, args.size);

    let manager = TransferManager::new();
    let download = HttpDownload::plain(descriptor, &config.save_dir, &config.temp_dir, context);
    manager.add_http_download(Arc::clone(&download));

    info!(
        url = %args.url,
        save = %download.save_file().display(),
        "Download starting"
    );

    let show_progress = !args.quiet && !args.json && io::stderr().is_terminal();
    let progress = progress::spawn_progress_ui(show_progress, Arc::clone(&download));

    download.start();
    let state = download.wait_until_complete().await;

    if let Some(handle) = progress {
        if let Err(e) = handle.await {
            warn!(error = %e, "progress task failed");
        }
    }

    if args.json {
        let snapshot = TransferSnapshot::of(download.as_ref());
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else if !args.quiet {
        println!("{state}: {}", download.save_path().display());
    }

    info!(
        state = %state,
        bytes = download.bytes_received(),
        to_review = manager.downloads_to_review(),
        "Download finished"
    );

    if state.is_errored() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
