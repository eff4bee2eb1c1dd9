//! Unified error types for the domain layer
//!
//! Local invalid moves (occupied cell, wrong turn) are never errors; they are
//! reported as ignored outcomes by the controller. These variants cover
//! construction and parsing failures only.

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Board length is not one of the supported sizes
    #[error("Unsupported board size: {0} (expected 4, 9 or 16)")]
    InvalidBoardSize(usize),

    /// Position does not exist on the board
    #[error("Position {position} is outside a board of {len} cells")]
    PositionOutOfRange { position: usize, len: usize },

    /// Parse error (for value objects)
    #[error("Parse error: {0}")]
    Parse(String),

    /// State transition not allowed
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
}

impl DomainError {
    /// Creates a parse error for string-to-type conversion failures.
    ///
    /// Use this in `FromStr` implementations when the input string
    /// doesn't match any known variant or format.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create an invalid state transition error
    pub fn invalid_state_transition(msg: impl Into<String>) -> Self {
        Self::InvalidStateTransition(msg.into())
    }

    pub fn position_out_of_range(position: usize, len: usize) -> Self {
        Self::PositionOutOfRange { position, len }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_board_size_message() {
        let err = DomainError::InvalidBoardSize(7);
        assert_eq!(
            err.to_string(),
            "Unsupported board size: 7 (expected 4, 9 or 16)"
        );
    }

    #[test]
    fn test_position_out_of_range() {
        let err = DomainError::position_out_of_range(12, 9);
        assert!(matches!(err, DomainError::PositionOutOfRange { .. }));
        assert!(err.to_string().contains("12"));
    }

    #[test]
    fn test_parse_error() {
        let err = DomainError::parse("Unknown game kind: chess");
        assert_eq!(err.to_string(), "Parse error: Unknown game kind: chess");
    }
}
