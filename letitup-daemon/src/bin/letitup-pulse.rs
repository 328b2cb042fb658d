//! Synthetic producer: sends a `trigger` to the hub at a fixed interval.
//! Useful for testing phones and the hub without any audio input.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use letitup_daemon::{logging, LetItUpConfig, Pulse, PulseSettings};
use tokio::sync::watch;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "letitup-pulse", version, about = "Send periodic test triggers to a Let-It-Up hub")]
struct Args {
    /// Config file (default: platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Hub address, host:port
    #[arg(long)]
    server: Option<String>,

    /// Milliseconds between triggers
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Trigger intensity, 0.0 to 1.0
    #[arg(long)]
    intensity: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => LetItUpConfig::load_from(path),
        None => LetItUpConfig::load(),
    }
    .context("Failed to load configuration")?;

    if let Some(server) = args.server {
        config.client.server_address = server;
    }
    if let Some(interval_ms) = args.interval_ms {
        config.pulse.interval_ms = interval_ms;
    }
    if let Some(intensity) = args.intensity {
        config.pulse.intensity = intensity;
    }
    config.validate().context("Invalid pulse settings")?;

    info!(
        "🔧 Let-It-Up pulse: intensity {} every {} ms to {}",
        config.pulse.intensity, config.pulse.interval_ms, config.client.server_address
    );

    let pulse = Pulse::new(PulseSettings {
        server_address: config.client.server_address.clone(),
        interval: Duration::from_millis(config.pulse.interval_ms),
        intensity: config.pulse.intensity,
        reconnect: config.reconnect_policy(),
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(pulse.run(shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("🛑 Received shutdown signal");

    let _ = shutdown_tx.send(true);
    let sent = task.await.context("Pulse task failed")?;
    info!("👋 Sent {} triggers", sent);

    Ok(())
}
