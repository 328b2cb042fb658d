//! Subscriber connection to the hub with automatic reconnection
//!
//! `Connecting → Connected → Disconnected`, then back to `Connecting` after a
//! fixed backoff. Every successful connect re-sends the identify handshake,
//! which makes the hub replay its cached state. Once the retry budget is
//! spent the status is reported as exhausted, but retries continue at the
//! backoff ceiling for as long as the client runs.

use std::time::Duration;

use letitup_protocol::{parse_hub_event, IdentifyPayload, InboundEvent, Role};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::runner::ClientEvent;

/// Connection lifecycle as seen by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected {
        /// Consecutive failed or dropped attempts
        attempts: u32,
        /// Retry budget spent; now retrying at the backoff ceiling
        exhausted: bool,
    },
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Disconnected { attempts, exhausted } => {
                write!(f, "disconnected ({} attempts", attempts)?;
                if *exhausted {
                    write!(f, ", retry budget spent")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// When and how often to reconnect. A single connect attempt is also
/// given up after `backoff_ceiling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Attempts at `backoff` before falling back to `backoff_ceiling`
    pub max_retries: u32,
    pub backoff: Duration,
    pub backoff_ceiling: Duration,
}

impl ReconnectPolicy {
    /// Delay before the next attempt, after `attempts` consecutive failures
    pub fn delay(&self, attempts: u32) -> Duration {
        if self.is_exhausted(attempts) {
            self.backoff_ceiling
        } else {
            self.backoff
        }
    }

    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts > self.max_retries
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff: Duration::from_secs(2),
            backoff_ceiling: Duration::from_secs(10),
        }
    }
}

#[derive(Debug)]
enum ClientCommand {
    Send(InboundEvent),
    Shutdown,
}

/// Cheap handle for talking to a running `HubClient`
#[derive(Debug, Clone)]
pub struct ClientHandle {
    commands: mpsc::Sender<ClientCommand>,
}

impl ClientHandle {
    /// Ask the hub to flash every subscriber, this one included
    pub async fn manual_trigger(&self) -> Result<()> {
        self.send(InboundEvent::ManualTrigger).await
    }

    /// Ask the hub for a status report
    pub async fn request_status(&self) -> Result<()> {
        self.send(InboundEvent::Status).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.commands
            .send(ClientCommand::Shutdown)
            .await
            .map_err(|_| ClientError::ConnectionClosed)
    }

    async fn send(&self, event: InboundEvent) -> Result<()> {
        self.commands
            .send(ClientCommand::Send(event))
            .await
            .map_err(|_| ClientError::ConnectionClosed)
    }
}

enum SessionEnd {
    /// Hub closed the connection or it broke
    Lost,
    Shutdown,
}

/// Subscriber connection manager. Constructed and owned explicitly; events
/// are pushed into the runner's queue.
pub struct HubClient {
    server_address: String,
    policy: ReconnectPolicy,
    events: mpsc::Sender<ClientEvent>,
    commands: mpsc::Receiver<ClientCommand>,
    /// False once every `ClientHandle` is dropped
    commands_open: bool,
}

impl HubClient {
    pub fn new(
        server_address: impl Into<String>,
        policy: ReconnectPolicy,
        events: mpsc::Sender<ClientEvent>,
    ) -> (Self, ClientHandle) {
        let (tx, rx) = mpsc::channel(16);
        let client = Self {
            server_address: server_address.into(),
            policy,
            events,
            commands: rx,
            commands_open: true,
        };
        (client, ClientHandle { commands: tx })
    }

    /// Connect and keep reconnecting until shut down.
    /// Fails only when the effect runner has gone away.
    pub async fn run(mut self) -> Result<()> {
        let mut attempts: u32 = 0;

        loop {
            self.report(ConnectionStatus::Connecting).await?;

            match self.connect().await {
                Ok(stream) => {
                    info!("✓ Connected to hub at {}", self.server_address);
                    attempts = 0;
                    self.report(ConnectionStatus::Connected).await?;

                    match self.session(stream).await {
                        Ok(SessionEnd::Shutdown) => return self.finish().await,
                        Ok(SessionEnd::Lost) => info!("Hub closed the connection"),
                        Err(ClientError::RunnerClosed) => return Err(ClientError::RunnerClosed),
                        Err(e) => warn!("Connection to hub lost: {}", e),
                    }
                }
                Err(e) => warn!("Failed to connect to {}: {}", self.server_address, e),
            }

            attempts = attempts.saturating_add(1);
            let exhausted = self.policy.is_exhausted(attempts);
            self.report(ConnectionStatus::Disconnected { attempts, exhausted })
                .await?;

            let delay = self.policy.delay(attempts);
            warn!("Reconnecting to hub in {:?}...", delay);

            let wake_at = tokio::time::Instant::now() + delay;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep_until(wake_at) => break,
                    command = self.commands.recv(), if self.commands_open => match command {
                        Some(ClientCommand::Send(event)) => {
                            debug!("Dropping {} while disconnected", event.kind());
                        }
                        Some(ClientCommand::Shutdown) => return self.finish().await,
                        None => self.commands_open = false,
                    },
                }
            }
        }
    }

    /// One connect attempt, bounded by the backoff ceiling
    async fn connect(&self) -> std::io::Result<TcpStream> {
        let limit = self.policy.backoff_ceiling;
        tokio::time::timeout(limit, TcpStream::connect(&self.server_address))
            .await
            .unwrap_or_else(|_| {
                Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("no answer within {:?}", limit),
                ))
            })
    }

    async fn session(&mut self, stream: TcpStream) -> Result<SessionEnd> {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle: {}", e);
        }
        let (read_half, mut write_half) = stream.into_split();

        let identify = InboundEvent::Identify(IdentifyPayload {
            role: Role::Subscriber,
        });
        write_half
            .write_all(identify.to_json_line()?.as_bytes())
            .await?;

        let mut lines = BufReader::new(read_half).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match parse_hub_event(&line) {
                            Ok(event) => self
                                .events
                                .send(ClientEvent::Hub(event))
                                .await
                                .map_err(|_| ClientError::RunnerClosed)?,
                            Err(e) => warn!("Ignoring malformed event from hub: {}", e),
                        }
                    }
                    None => return Ok(SessionEnd::Lost),
                },
                command = self.commands.recv(), if self.commands_open => match command {
                    Some(ClientCommand::Send(event)) => {
                        write_half.write_all(event.to_json_line()?.as_bytes()).await?;
                    }
                    Some(ClientCommand::Shutdown) => {
                        let _ = write_half.shutdown().await;
                        return Ok(SessionEnd::Shutdown);
                    }
                    None => self.commands_open = false,
                },
            }
        }
    }

    async fn report(&self, status: ConnectionStatus) -> Result<()> {
        debug!("Connection status: {}", status);
        self.events
            .send(ClientEvent::Connection(status))
            .await
            .map_err(|_| ClientError::RunnerClosed)
    }

    async fn finish(&self) -> Result<()> {
        info!("Hub client shutting down");
        // Runner may already be gone; nothing left to tell it then
        let _ = self.events.send(ClientEvent::Shutdown).await;
        Ok(())
    }
}
