//! Headless subscriber: connects to the hub and logs every flash effect
//! instead of driving a screen and torch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use letitup_client::{LogSink, Subscriber};
use letitup_daemon::{logging, LetItUpConfig};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "letitup-subscriber", version, about = "Headless Let-It-Up subscriber")]
struct Args {
    /// Config file (default: platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Hub address, host:port
    #[arg(long)]
    server: Option<String>,

    /// Ask the hub for a manual flash once connected
    #[arg(long)]
    manual_trigger: bool,
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

    info!("📱 Subscribing to {}", config.client.server_address);
    let subscriber = Subscriber::spawn(config.subscriber_settings(), LogSink::new());

    if args.manual_trigger {
        // Queued until the first connect; dropped if that connect fails
        if let Err(e) = subscriber.handle().manual_trigger().await {
            warn!("Could not request manual flash: {}", e);
        }
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("🛑 Received shutdown signal");

    if let Some(machine) = subscriber.shutdown().await {
        info!("👋 {} flash effects shown", machine.completed_cycles());
    }

    Ok(())
}
