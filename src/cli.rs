//! CLI argument parsing using clap 4.x derive macros

use clap::Parser;
use std::path::PathBuf;

/// Receiver client for streamed heatmap frames
///
/// Drives the generation service's control API, then receives frames over
/// the websocket stream and archives them with an integrity summary.
#[derive(Parser, Debug)]
#[command(name = "heatlink")]
#[command(author, about, long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Server host or URL
    #[arg(short, long)]
    pub server: Option<String>,

    /// Directory to write frames and the summary into
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Satellite dataset (JSON file) used to initialize the backend
    #[arg(long)]
    pub satellite_file: Option<PathBuf>,

    /// Generation window in seconds
    #[arg(long)]
    pub duration: Option<u64>,

    /// Step between frames in seconds
    #[arg(long)]
    pub step: Option<u64>,

    /// Generation start time (ISO 8601)
    #[arg(long)]
    pub start_time: Option<String>,

    /// Skip backend initialization
    #[arg(long)]
    pub skip_init: bool,

    /// Skip the generation request and only receive
    #[arg(long)]
    pub skip_generate: bool,

    /// Print version information
    #[arg(long)]
    pub version: bool,
}
