//! Response bodies from the authority.
//!
//! REST endpoints return the bodies directly; the hub wraps them in a
//! [`ResponseResult`] keyed by `request_id`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::dto::{GameStateDto, PlayerDto};
use crate::error::ProtocolError;

// =============================================================================
// REST bodies
// =============================================================================

/// Reply to `POST /games` / `CreateGame`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameResponse {
    #[serde(default, alias = "GameId", skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(default, alias = "Id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, alias = "GameType", skip_serializing_if = "Option::is_none")]
    pub game_type: Option<String>,
    #[serde(default, alias = "State", skip_serializing_if = "Option::is_none")]
    pub state: Option<GameStateDto>,
}

impl CreateGameResponse {
    /// Game id from the top level, falling back to the embedded state.
    pub fn resolved_game_id(&self) -> Option<&str> {
        [self.game_id.as_deref(), self.id.as_deref()]
            .into_iter()
            .flatten()
            .find(|id| !id.trim().is_empty())
            .or_else(|| self.state.as_ref().and_then(GameStateDto::resolved_id))
    }
}

/// Reply to `POST /games/{id}/join` / `JoinGame`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinGameResponse {
    #[serde(alias = "State")]
    pub state: GameStateDto,
    #[serde(
        default,
        alias = "Player",
        alias = "playerDto",
        skip_serializing_if = "Option::is_none"
    )]
    pub player: Option<PlayerDto>,
}

/// Reply to a move. Authorities either wrap the new state, return it bare,
/// or return nothing useful and push the state later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MoveResponse {
    Wrapped {
        #[serde(alias = "State")]
        state: GameStateDto,
    },
    Bare(GameStateDto),
    Other(serde_json::Value),
}

impl MoveResponse {
    pub fn into_state(self) -> Option<GameStateDto> {
        match self {
            MoveResponse::Wrapped { state } | MoveResponse::Bare(state) => Some(state),
            MoveResponse::Other(_) => None,
        }
    }
}

// =============================================================================
// Hub response envelope
// =============================================================================

/// Result of a hub invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResponseResult {
    Success {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
    /// Unknown response type for forward compatibility
    #[serde(other)]
    Unknown,
}

impl ResponseResult {
    /// Create a success response with data
    pub fn success<T: Serialize>(data: T) -> Self {
        ResponseResult::Success {
            data: serde_json::to_value(data).ok(),
        }
    }

    pub fn success_empty() -> Self {
        ResponseResult::Success { data: None }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ResponseResult::Error {
            code,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResponseResult::Success { .. })
    }

    /// Decode the success payload. `data: None` decodes as JSON `null`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        match self {
            ResponseResult::Success { data } => {
                let value = data.clone().unwrap_or(serde_json::Value::Null);
                Ok(serde_json::from_value(value)?)
            }
            ResponseResult::Error { code, message } => Err(ProtocolError::malformed(format!(
                "expected success, got {:?}: {}",
                code, message
            ))),
            ResponseResult::Unknown => Err(ProtocolError::malformed("unknown response status")),
        }
    }
}

/// Error classification codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BadRequest,
    /// Requested game does not exist
    NotFound,
    /// Move rejected in the current state (wrong turn, occupied cell)
    Conflict,
    InternalError,
    ServiceUnavailable,
    Timeout,
    /// Unknown variant for forward compatibility
    #[serde(other)]
    Unknown,
}
