use thiserror::Error;

use crate::connection::ConnectionId;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    #[error("Hub server not started")]
    NotStarted,

    #[error("Hub server already running")]
    AlreadyRunning,
}

pub type Result<T> = std::result::Result<T, HubError>;
