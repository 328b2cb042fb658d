use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Line is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Unknown event kind: {0}")]
    UnknownKind(String),

    #[error("Invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
