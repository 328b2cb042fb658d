//! Synthetic producer: a steady stream of `trigger` events
//!
//! Stands in for the beat analyzer when testing without audio input.
//! Reconnects with the client reconnect policy if the hub goes away.

use std::time::Duration;

use letitup_client::ReconnectPolicy;
use letitup_protocol::{now_timestamp, IdentifyPayload, InboundEvent, Role, TriggerPayload};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Hub closed the connection")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct PulseSettings {
    pub server_address: String,
    pub interval: Duration,
    pub intensity: f64,
    pub reconnect: ReconnectPolicy,
}

/// Periodic trigger producer
pub struct Pulse {
    settings: PulseSettings,
    sent: u64,
}

impl Pulse {
    pub fn new(settings: PulseSettings) -> Self {
        Self { settings, sent: 0 }
    }

    /// Send triggers until `shutdown` flips to true. Returns how many were sent.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut attempts: u32 = 0;

        while !*shutdown.borrow() {
            // A single attempt never outlasts the backoff ceiling
            let limit = self.settings.reconnect.backoff_ceiling;
            let connected =
                tokio::time::timeout(limit, TcpStream::connect(&self.settings.server_address))
                    .await
                    .unwrap_or_else(|_| {
                        Err(std::io::Error::new(
                            std::io::ErrorKind::TimedOut,
                            format!("no answer within {:?}", limit),
                        ))
                    });
            match connected {
                Ok(stream) => {
                    info!("✓ Connected to hub at {}", self.settings.server_address);
                    attempts = 0;
                    match self.session(stream, &mut shutdown).await {
                        Ok(()) => break,
                        Err(e) => warn!("Lost hub connection: {}", e),
                    }
                }
                Err(e) => warn!(
                    "Failed to connect to {}: {}",
                    self.settings.server_address, e
                ),
            }

            attempts = attempts.saturating_add(1);
            let delay = self.settings.reconnect.delay(attempts);
            warn!("Reconnecting in {:?}...", delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Pulse stopped after {} triggers", self.sent);
        self.sent
    }

    /// Returns Ok only on shutdown
    async fn session(
        &mut self,
        stream: TcpStream,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), PulseError> {
        let (mut read_half, mut write_half) = stream.into_split();

        let identify = InboundEvent::Identify(IdentifyPayload {
            role: Role::Producer,
        });
        write_half
            .write_all(identify.to_json_line()?.as_bytes())
            .await?;

        let mut ticker = tokio::time::interval(self.settings.interval);
        let mut scratch = [0u8; 1024];

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let trigger = InboundEvent::Trigger(TriggerPayload {
                        intensity: Some(self.settings.intensity),
                        timestamp: Some(now_timestamp()),
                        event_type: None,
                    });
                    write_half.write_all(trigger.to_json_line()?.as_bytes()).await?;
                    self.sent += 1;
                    info!("⚡ Trigger #{} sent", self.sent);
                }
                // Producers get nothing but error notices; read only to notice a close
                read = read_half.read(&mut scratch) => {
                    if read? == 0 {
                        return Err(PulseError::Closed);
                    }
                }
                _ = shutdown.changed() => {
                    let _ = write_half.shutdown().await;
                    return Ok(());
                }
            }
        }
    }
}
