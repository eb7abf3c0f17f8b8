//! `heatlink` - receiver client for streamed heatmap frames
//!
//! This binary drives the remote generation service's control API, then
//! archives the websocket frame stream to local storage with a final
//! integrity summary.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cli::Cli;
use crate::output::OutputFormatter;
use heatlink_core::config::Config;
use heatlink_core::control::ControlClient;
use heatlink_core::session::{GenerationParams, Session, SessionOptions};
use heatlink_core::sink::FrameSink;

mod cli;
mod output;

/// Main entry point for the receiver CLI
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!(
            "heatlink v{} ({})",
            env!("CARGO_PKG_VERSION"),
            env!("GIT_HASH")
        );
        return Ok(());
    }

    heatlink_core::logger::init_default();

    let config = Config::load().context("Failed to load configuration")?;
    let server = cli.server.clone().unwrap_or_else(|| config.server.clone());
    let output_root = cli.output.clone().unwrap_or_else(|| config.output_dir.clone());

    let satellites = if cli.skip_init {
        None
    } else {
        let path = cli
            .satellite_file
            .as_deref()
            .context("--satellite-file is required unless --skip-init is set")?;
        Some(load_satellites(path)?)
    };

    let generation = if cli.skip_generate {
        None
    } else {
        Some(GenerationParams {
            duration_seconds: cli.duration.unwrap_or(config.duration_seconds),
            step_seconds: cli.step.unwrap_or(config.step_seconds),
            start_time: cli.start_time.clone(),
        })
    };

    let control = ControlClient::new(&server)?;
    let sink = FrameSink::new(&output_root)
        .with_context(|| format!("Failed to create output directory {}", output_root.display()))?;

    let formatter = OutputFormatter::new();
    formatter.print_banner(control.host(), sink.root());

    let options = SessionOptions {
        satellites,
        generation,
        read_timeout: Duration::from_secs(config.read_timeout_secs),
        connect_timeout: Duration::from_secs(config.connect_timeout_secs),
    };

    // Ctrl-C cancels the stream; the session still writes its summary
    // with whatever arrived.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let session = Session::new(control, sink, options).with_progress(Box::new({
        let progress_formatter = OutputFormatter::new();
        move |progress| progress_formatter.print_progress(progress)
    }));

    let report = session.run(cancel).await;
    formatter.print_report(&report);

    if !report.outcome.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn load_satellites(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read satellite file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Satellite file {} is not valid JSON", path.display()))
}
