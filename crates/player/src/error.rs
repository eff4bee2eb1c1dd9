//! Errors surfaced by the transports and the session manager.

use std::time::Duration;

use playtogether_shared::ProtocolError;

/// Session-layer error.
///
/// `Clone` so that every caller waiting on one single-flight attempt
/// receives the same result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Authority refused or unreachable
    #[error("Connect failed: {0}")]
    Connect(String),

    /// Remote session missing or join rejected
    #[error("Join failed: {message}")]
    Join { message: String, not_found: bool },

    /// Command rejected or undeliverable
    #[error("Send failed: {0}")]
    Send(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Not connected")]
    NotConnected,

    #[error("A game kind is required to create a session")]
    MissingGameKind,

    #[error("Cancelled")]
    Cancelled,

    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<SessionError>,
    },
}

impl SessionError {
    pub fn connect(msg: impl Into<String>) -> Self {
        Self::Connect(msg.into())
    }

    pub fn join(msg: impl Into<String>) -> Self {
        Self::Join {
            message: msg.into(),
            not_found: false,
        }
    }

    pub fn join_not_found(msg: impl Into<String>) -> Self {
        Self::Join {
            message: msg.into(),
            not_found: true,
        }
    }

    pub fn send(msg: impl Into<String>) -> Self {
        Self::Send(msg.into())
    }

    pub fn timeout(operation: &'static str, after: Duration) -> Self {
        Self::Timeout { operation, after }
    }

    /// Remote session does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SessionError::Join {
                not_found: true,
                ..
            }
        )
    }

    /// Whether a create/join attempt failing with this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Connect(_) | SessionError::Send(_) | SessionError::Timeout { .. } => {
                true
            }
            SessionError::Join { not_found, .. } => !not_found,
            SessionError::Protocol(_)
            | SessionError::NotConnected
            | SessionError::MissingGameKind
            | SessionError::Cancelled
            | SessionError::Exhausted { .. } => false,
        }
    }

    /// Errors that mean the hub itself is unusable, so `auto` mode may fall back to polling.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            SessionError::Connect(_) | SessionError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_terminal_for_retry() {
        let err = SessionError::join_not_found("game g1 not found");
        assert!(err.is_not_found());
        assert!(!err.is_retryable());

        let rejected = SessionError::join("game full");
        assert!(!rejected.is_not_found());
        assert!(rejected.is_retryable());
    }

    #[test]
    fn test_exhausted_carries_last_message() {
        let err = SessionError::Exhausted {
            attempts: 5,
            last: Box::new(SessionError::connect("connection refused")),
        };
        assert_eq!(
            err.to_string(),
            "Gave up after 5 attempts: Connect failed: connection refused"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_unreachable_classification() {
        assert!(SessionError::connect("refused").is_unreachable());
        assert!(SessionError::timeout("open", Duration::from_secs(5)).is_unreachable());
        assert!(!SessionError::send("409").is_unreachable());
    }
}
