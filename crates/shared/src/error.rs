//! Errors raised while interpreting authoritative payloads.

use playtogether_domain::DomainError;

/// Unexpected or malformed payload from the Remote Authority.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Unknown game status: {0}")]
    UnknownStatus(String),

    #[error("Unknown game type: {0}")]
    UnknownGameType(String),

    #[error("Invalid value {value:?} in cell {position}")]
    InvalidCell { position: usize, value: String },

    #[error("Invalid board: {0}")]
    InvalidBoard(#[from] DomainError),

    #[error("Missing field: {0}")]
    MissingField(&'static str),
}

impl ProtocolError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
