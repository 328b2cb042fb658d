//! Connection classification, shared state and fan-out
//!
//! All mutations go through one async mutex, so an ingested event reaches
//! every subscriber's queue before the next event is looked at. Queues are
//! fed with `try_send`: a subscriber that is gone or too slow is dropped on
//! the spot and never delays the others.

use std::sync::Arc;

use letitup_protocol::{
    derive_flash, now_timestamp, ErrorNotice, FlashPayload, HubEvent, InboundEvent, Role,
    StatusReport,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionId, ConnectionRegistry, ConnectionRole, Outbound};
use crate::error::{HubError, Result};
use crate::state::SharedState;

/// Result of an identify handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifyOutcome {
    /// Role set by this handshake
    Assigned(Role),
    /// Role was already set; the resend changed nothing
    AlreadyIdentified(ConnectionRole),
    /// Another producer holds the exclusive producer slot
    Rejected,
}

struct HubInner {
    connections: ConnectionRegistry,
    state: SharedState,
}

impl HubInner {
    fn send_to(&mut self, id: ConnectionId, event: &HubEvent) -> Result<()> {
        let line: Arc<str> = Arc::from(event.to_json_line()?);
        let connection = self
            .connections
            .get(id)
            .ok_or(HubError::UnknownConnection(id))?;

        if let Err(failure) = connection.try_send(&line) {
            warn!("Failed to send {} to {}: {}", event.kind(), id, failure);
            self.drop_connection(id);
        }
        Ok(())
    }

    /// Queue an event for every subscriber, disconnecting those that fail
    fn fan_out(&mut self, event: &HubEvent) -> Result<usize> {
        let line: Arc<str> = Arc::from(event.to_json_line()?);
        let (delivered, dead) = self.connections.broadcast(&line);

        for (id, failure) in dead {
            warn!("Failed to send {} to {}: {}", event.kind(), id, failure);
            self.drop_connection(id);
        }

        debug!("Fanned out {} to {} subscribers", event.kind(), delivered);
        Ok(delivered)
    }

    fn drop_connection(&mut self, id: ConnectionId) -> Option<ConnectionRole> {
        let connection = self.connections.remove(id)?;
        let role = connection.role();
        info!(
            "Removed {} {}. Subscribers: {}, producers: {}",
            role,
            id,
            self.connections.count(ConnectionRole::Subscriber),
            self.connections.count(ConnectionRole::Producer),
        );
        Some(role)
    }

    fn status(&self) -> StatusReport {
        StatusReport {
            subscriber_count: self.connections.count(ConnectionRole::Subscriber),
            producer_connected: self.connections.count(ConnectionRole::Producer) > 0,
            current_bpm: self.state.current_tempo(),
            current_lyric: self.state.current_lyric().map(|l| l.text.clone()),
        }
    }
}

/// Broadcast hub shared by every connection task
pub struct Hub {
    inner: Mutex<HubInner>,
    exclusive_producer: bool,
}

impl Hub {
    /// Create a hub. With `exclusive_producer`, only one producer may be
    /// identified at a time; otherwise the last update of any producer wins.
    pub fn new(exclusive_producer: bool) -> Self {
        Self {
            inner: Mutex::new(HubInner {
                connections: ConnectionRegistry::new(),
                state: SharedState::new(),
            }),
            exclusive_producer,
        }
    }

    /// Register a freshly accepted connection
    pub async fn register(&self, outbound: Outbound) -> ConnectionId {
        let mut inner = self.inner.lock().await;
        let id = inner.connections.insert(outbound);
        debug!("Registered {}. Open connections: {}", id, inner.connections.len());
        id
    }

    /// Set a connection's role; subscribers get the cached state right away
    pub async fn identify(&self, id: ConnectionId, role: Role) -> Result<IdentifyOutcome> {
        let mut inner = self.inner.lock().await;

        let current = inner
            .connections
            .get(id)
            .map(|c| c.role())
            .ok_or(HubError::UnknownConnection(id))?;

        if current != ConnectionRole::Unidentified {
            debug!("{} already identified as {}, ignoring", id, current);
            return Ok(IdentifyOutcome::AlreadyIdentified(current));
        }

        if role == Role::Producer
            && self.exclusive_producer
            && inner.connections.count(ConnectionRole::Producer) > 0
        {
            warn!("Rejecting producer {}: producer slot taken", id);
            inner.send_to(
                id,
                &HubEvent::Error(ErrorNotice {
                    message: "another producer is already connected".to_string(),
                }),
            )?;
            return Ok(IdentifyOutcome::Rejected);
        }

        inner.connections.assign_role(id, role);

        match role {
            Role::Producer => {
                info!(
                    "Producer {} identified. Producers: {}",
                    id,
                    inner.connections.count(ConnectionRole::Producer)
                );
            }
            Role::Subscriber => {
                info!(
                    "Subscriber {} identified. Subscribers: {}",
                    id,
                    inner.connections.count(ConnectionRole::Subscriber)
                );
                for event in inner.state.replay_events() {
                    if inner.connections.get(id).is_none() {
                        break;
                    }
                    inner.send_to(id, &event)?;
                }
            }
        }

        Ok(IdentifyOutcome::Assigned(role))
    }

    /// Act on a validated event from a connection
    pub async fn ingest(&self, id: ConnectionId, event: InboundEvent) -> Result<()> {
        match &event {
            InboundEvent::Identify(identify) => {
                self.identify(id, identify.role).await?;
                return Ok(());
            }
            InboundEvent::ManualTrigger => {
                self.require_known(id).await?;
                debug!("Manual trigger from {}", id);
                self.manual_trigger().await?;
                return Ok(());
            }
            _ => {}
        }

        let mut inner = self.inner.lock().await;
        let role = inner
            .connections
            .get(id)
            .map(|c| c.role())
            .ok_or(HubError::UnknownConnection(id))?;

        if matches!(event, InboundEvent::Status) {
            let report = inner.status();
            return inner.send_to(id, &HubEvent::Status(report));
        }

        if role != ConnectionRole::Producer {
            warn!("Dropping {} from {} {}: not a producer", event.kind(), role, id);
            return Ok(());
        }

        let now = now_timestamp();
        match event {
            InboundEvent::Trigger(trigger) => {
                inner.fan_out(&HubEvent::Flash(FlashPayload::from_trigger(&trigger, now)))?;
            }
            InboundEvent::Analysis(analysis) => {
                inner.state.record_analysis(&analysis);
                let flash = derive_flash(&analysis, now);
                inner.fan_out(&HubEvent::Analysis(analysis))?;
                inner.fan_out(&HubEvent::Flash(flash))?;
            }
            InboundEvent::LyricUpdate(lyric) => {
                inner.state.record_lyric(&lyric);
                inner.fan_out(&HubEvent::LyricUpdate(lyric))?;
            }
            InboundEvent::Identify(_) | InboundEvent::ManualTrigger | InboundEvent::Status => {}
        }

        Ok(())
    }

    /// Fan out a synthetic full-intensity flash tagged `manual`
    pub async fn manual_trigger(&self) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        inner.fan_out(&HubEvent::Flash(FlashPayload::manual(now_timestamp())))
    }

    /// Remove a connection. Cached state is kept for later joiners.
    /// Returns the role the connection had, or `None` if already gone.
    pub async fn disconnect(&self, id: ConnectionId) -> Option<ConnectionRole> {
        self.inner.lock().await.drop_connection(id)
    }

    /// Read-only health view
    pub async fn snapshot(&self) -> StatusReport {
        self.inner.lock().await.status()
    }

    /// Close every connection's outbound queue
    pub async fn close_all(&self) {
        let mut inner = self.inner.lock().await;
        let count = inner.connections.len();
        inner.connections.clear();
        info!("Closed {} connections", count);
    }

    async fn require_known(&self, id: ConnectionId) -> Result<()> {
        let inner = self.inner.lock().await;
        match inner.connections.get(id) {
            Some(_) => Ok(()),
            None => Err(HubError::UnknownConnection(id)),
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(false)
    }
}
