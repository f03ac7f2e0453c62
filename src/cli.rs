//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Download a single URL through the transfer state machine.
///
/// The file is written to the temp directory while downloading and moved into
/// the save directory once complete.
#[derive(Parser, Debug)]
#[command(name = "fw-transfers")]
#[command(author, version, about)]
pub struct Args {
    /// URL to download
    pub url: String,

    /// Filename to save as (defaults to the last URL path segment)
    #[arg(short, long)]
    pub filename: Option<String>,

    /// Name shown in progress output (defaults to the filename)
    #[arg(long)]
    pub display_name: Option<String>,

    /// Expected size in bytes, used for progress and ETA
    #[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(i64).range(0..))]
    pub size: i64,

    /// Directory finished downloads are moved to (overrides config)
    #[arg(long)]
    pub save_dir: Option<PathBuf>,

    /// Directory partial downloads are written to (overrides config)
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,

    /// Print the final transfer snapshot as JSON
    #[arg(long)]
    pub json: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
