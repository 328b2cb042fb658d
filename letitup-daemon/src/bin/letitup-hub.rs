//! Let-It-Up hub - real-time beat trigger broadcaster
//!
//! Producers (beat analyzers) connect and identify as `producer`; phones and
//! browser tabs identify as `subscriber`. Every trigger is fanned out to all
//! subscribers, and late joiners get the current lyric and tempo on join.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use letitup_daemon::{logging, LetItUpConfig};
use letitup_hub::HubServer;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "letitup-hub", version, about = "Let-It-Up trigger broadcast hub")]
struct Args {
    /// Config file (default: platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Interface to bind
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    info!("🎉 Starting Let-It-Up hub v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => LetItUpConfig::load_from(path),
        None => LetItUpConfig::load(),
    }
    .context("Failed to load configuration")?;
    info!("📋 Configuration loaded from {}", config.config_path.display());

    if let Some(port) = args.port {
        config.hub.port = port;
    }
    if let Some(bind) = args.bind {
        config.hub.bind_address = bind;
    }

    let server = HubServer::new(config.hub_settings());
    let addr = server
        .start()
        .await
        .with_context(|| format!("Failed to start hub on {}", config.listen_addr()))?;

    info!("🚀 Hub ready on {}", addr);
    info!("  - Producers identify with {{\"type\":\"producer\"}}");
    info!("  - Subscribers identify with {{\"type\":\"subscriber\"}}");
    if config.hub.exclusive_producer {
        info!("  - Exclusive producer mode: a second producer is refused");
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("🛑 Received shutdown signal");

    let status = server.hub().snapshot().await;
    info!(
        "🧹 Shutting down ({} subscribers connected)...",
        status.subscriber_count
    );
    server.stop().await.context("Failed to stop hub")?;
    info!("👋 Let-It-Up hub stopped");

    Ok(())
}
