use std::collections::HashMap;
use std::sync::Arc;

use letitup_protocol::Role;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Identifier assigned to a connection at accept time, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Role of a connection; every connection starts unidentified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    Unidentified,
    Producer,
    Subscriber,
}

impl From<Role> for ConnectionRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Producer => ConnectionRole::Producer,
            Role::Subscriber => ConnectionRole::Subscriber,
        }
    }
}

impl std::fmt::Display for ConnectionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionRole::Unidentified => write!(f, "unidentified"),
            ConnectionRole::Producer => write!(f, "producer"),
            ConnectionRole::Subscriber => write!(f, "subscriber"),
        }
    }
}

/// Sending half of a connection's bounded outbound queue.
/// Lines are serialized once per fan-out and shared between subscribers.
pub type Outbound = mpsc::Sender<Arc<str>>;

/// Why a line could not be queued for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SendFailure {
    /// Peer is not draining its queue fast enough
    QueueFull,
    /// Writer task is gone, the transport is broken
    Closed,
}

impl std::fmt::Display for SendFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendFailure::QueueFull => write!(f, "outbound queue full"),
            SendFailure::Closed => write!(f, "transport closed"),
        }
    }
}

/// Connection wrapper
pub struct Connection {
    id: ConnectionId,
    role: ConnectionRole,
    outbound: Outbound,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn role(&self) -> ConnectionRole {
        self.role
    }

    /// Queue a line without waiting
    pub fn try_send(&self, line: &Arc<str>) -> Result<(), SendFailure> {
        self.outbound
            .try_send(Arc::clone(line))
            .map_err(|e| match e {
                TrySendError::Full(_) => SendFailure::QueueFull,
                TrySendError::Closed(_) => SendFailure::Closed,
            })
    }
}

/// Live connections keyed by id
///
/// Not synchronized on its own; the hub owns it behind its lock.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
    next_id: u64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new unidentified connection
    pub fn insert(&mut self, outbound: Outbound) -> ConnectionId {
        self.next_id += 1;
        let id = ConnectionId(self.next_id);
        self.connections.insert(
            id,
            Connection {
                id,
                role: ConnectionRole::Unidentified,
                outbound,
            },
        );
        id
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Set the role of an unidentified connection.
    /// Returns the role the connection ends up with.
    pub fn assign_role(&mut self, id: ConnectionId, role: Role) -> Option<ConnectionRole> {
        let connection = self.connections.get_mut(&id)?;
        if connection.role == ConnectionRole::Unidentified {
            connection.role = role.into();
        }
        Some(connection.role)
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    /// Queue a line for every subscriber, returning the ones that failed.
    /// A failure never stops delivery to the rest.
    pub fn broadcast(&self, line: &Arc<str>) -> (usize, Vec<(ConnectionId, SendFailure)>) {
        let mut delivered = 0;
        let mut dead = Vec::new();

        for connection in self.subscribers() {
            match connection.try_send(line) {
                Ok(()) => delivered += 1,
                Err(failure) => dead.push((connection.id, failure)),
            }
        }

        (delivered, dead)
    }

    pub fn subscribers(&self) -> impl Iterator<Item = &Connection> {
        self.connections
            .values()
            .filter(|c| c.role == ConnectionRole::Subscriber)
    }

    pub fn count(&self, role: ConnectionRole) -> usize {
        self.connections.values().filter(|c| c.role == role).count()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Drop every connection, closing their outbound queues
    pub fn clear(&mut self) {
        self.connections.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_never_reused() {
        let mut registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::channel(4);
        let first = registry.insert(tx.clone());
        registry.remove(first);
        let second = registry.insert(tx);
        assert_ne!(first, second);
        assert!(second > first);
    }

    #[test]
    fn test_role_assigned_once() {
        let mut registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::channel(4);
        let id = registry.insert(tx);

        assert_eq!(registry.assign_role(id, Role::Subscriber), Some(ConnectionRole::Subscriber));
        assert_eq!(registry.assign_role(id, Role::Producer), Some(ConnectionRole::Subscriber));
        assert_eq!(registry.count(ConnectionRole::Subscriber), 1);
        assert_eq!(registry.count(ConnectionRole::Producer), 0);
    }

    #[test]
    fn test_broadcast_skips_non_subscribers_and_reports_failures() {
        let mut registry = ConnectionRegistry::new();
        let (producer_tx, mut producer_rx) = mpsc::channel(4);
        let (live_tx, mut live_rx) = mpsc::channel(4);
        let (full_tx, _full_rx) = mpsc::channel(1);
        let (closed_tx, closed_rx) = mpsc::channel(4);
        drop(closed_rx);

        let producer = registry.insert(producer_tx);
        registry.assign_role(producer, Role::Producer);
        let live = registry.insert(live_tx);
        registry.assign_role(live, Role::Subscriber);
        let full = registry.insert(full_tx);
        registry.assign_role(full, Role::Subscriber);
        let closed = registry.insert(closed_tx);
        registry.assign_role(closed, Role::Subscriber);

        let filler: Arc<str> = Arc::from("filler\n");
        registry.get(full).unwrap().try_send(&filler).unwrap();

        let line: Arc<str> = Arc::from("hello\n");
        let (delivered, mut dead) = registry.broadcast(&line);
        dead.sort();

        assert_eq!(delivered, 1);
        assert_eq!(dead, vec![(full, SendFailure::QueueFull), (closed, SendFailure::Closed)]);
        assert_eq!(&*live_rx.try_recv().unwrap(), "hello\n");
        assert!(producer_rx.try_recv().is_err());
    }
}
