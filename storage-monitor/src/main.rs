// SPDX-License-Identifier: GPL-3.0-only

//! COSMIC Ext Volume Monitor - reports volumes becoming usable or unusable
//!
//! Tracks UDisks2 disks and volumes on the system bus and prints one line
//! per lifecycle notification until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use storage_tracker::VolumeLifecycleTracker;
use storage_udisks::UdisksEventSource;
use tracing_subscriber::{EnvFilter, fmt};

mod config;
mod output;

use config::{MonitorConfig, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "cosmic-ext-volume-monitor", version)]
#[command(about = "Print volume lifecycle notifications from UDisks2")]
struct MonitorCli {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the configured output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = MonitorCli::parse();
    let config = MonitorConfig::load(cli.config.as_deref())?;
    let format = cli.format.unwrap_or(config.format);

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(
        "Starting COSMIC Ext Volume Monitor v{}",
        env!("CARGO_PKG_VERSION")
    );

    let source = UdisksEventSource::new().await?;
    let mut tracker = VolumeLifecycleTracker::new(Arc::new(source), config.tracker.clone());
    let mut events = tracker.subscribe();
    tracker.start().await?;

    let snapshot = tracker.snapshot();
    tracing::info!(
        "Tracking {} disks and {} volumes",
        snapshot.disks.len(),
        snapshot.volumes.len()
    );

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else {
                    tracing::warn!("Lifecycle stream closed");
                    break;
                };
                match output::format_event(&event, format) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::error!("Failed to format lifecycle event: {e}"),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                tracing::info!("Received shutdown signal");
                break;
            }
        }
    }

    tracker.stop().await;
    tracing::info!("COSMIC Ext Volume Monitor shutting down");
    Ok(())
}
