//! REST request bodies sent to the authority's `/games` endpoints.

use serde::{Deserialize, Serialize};

use playtogether_domain::{GameKind, ParticipantId, RemoteGameId};

/// `POST /games`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    pub game_type: String,
}

impl CreateGameRequest {
    pub fn new(kind: GameKind) -> Self {
        Self {
            game_type: kind.wire_name().to_string(),
        }
    }
}

/// `POST /games/{id}/join`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGameRequest {
    pub player_name: String,
}

/// `POST /games/{id}/move` and `POST /games/{id}/flip`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub game_id: String,
    pub player_id: String,
    pub position: usize,
}

impl MoveRequest {
    pub fn new(game_id: &RemoteGameId, player_id: &ParticipantId, position: usize) -> Self {
        Self {
            game_id: game_id.to_string(),
            player_id: player_id.to_string(),
            position,
        }
    }
}

/// `POST /games/{id}/leave`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub player_id: String,
}
