use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Effect runner is gone")]
    RunnerClosed,

    #[error("Client connection task is gone")]
    ConnectionClosed,
}

/// Hardware actuator could not be driven. Never fatal: the effect
/// continues visual-only.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActuatorError {
    #[error("Actuator unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
