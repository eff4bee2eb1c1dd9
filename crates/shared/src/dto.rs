//! Wire-format game state.
//!
//! The authority has shipped both camelCase and PascalCase payloads, so every
//! field accepts either spelling. Conversion into [`Snapshot`] is where the
//! payload gets validated.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use playtogether_domain::{
    Board, Cell, GameKind, GameStatus, ParticipantId, Snapshot, Symbol,
};

use crate::error::ProtocolError;

/// Cell value as sent by the authority: a mark (`"X"`), a numeric string (`"7"`) or a bare number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValueDto {
    Number(u32),
    Text(String),
}

impl CellValueDto {
    /// `None` for the empty string, which some authorities send for a free cell.
    fn to_symbol(&self, position: usize) -> Result<Option<Symbol>, ProtocolError> {
        match self {
            CellValueDto::Number(n) => Ok(Some(Symbol::Number(*n))),
            CellValueDto::Text(text) if text.trim().is_empty() => Ok(None),
            CellValueDto::Text(text) => {
                Symbol::from_str(text)
                    .map(Some)
                    .map_err(|_| ProtocolError::InvalidCell {
                        position,
                        value: text.clone(),
                    })
            }
        }
    }
}

impl From<Symbol> for CellValueDto {
    fn from(symbol: Symbol) -> Self {
        CellValueDto::Text(symbol.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellDto {
    #[serde(alias = "Index", alias = "position", alias = "Position")]
    pub index: usize,
    #[serde(default, alias = "Value")]
    pub value: Option<CellValueDto>,
    #[serde(
        default,
        alias = "Revealed",
        alias = "isRevealed",
        alias = "IsRevealed",
        skip_serializing_if = "Option::is_none"
    )]
    pub revealed: Option<bool>,
}

impl CellDto {
    /// An occupied cell without an explicit `revealed` flag counts as revealed.
    pub fn to_cell(&self) -> Result<Cell, ProtocolError> {
        let value = match &self.value {
            Some(value) => value.to_symbol(self.index)?,
            None => None,
        };
        let revealed = self.revealed.unwrap_or(value.is_some());
        Ok(Cell::from_parts(self.index, value, revealed))
    }
}

impl From<&Cell> for CellDto {
    fn from(cell: &Cell) -> Self {
        Self {
            index: cell.position(),
            value: cell.value().map(CellValueDto::from),
            revealed: Some(cell.is_revealed()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDto {
    #[serde(alias = "Id")]
    pub id: String,
    #[serde(default, alias = "Name")]
    pub name: Option<String>,
    #[serde(default, alias = "Mark", skip_serializing_if = "Option::is_none")]
    pub mark: Option<CellValueDto>,
    #[serde(default, alias = "IsHost", skip_serializing_if = "Option::is_none")]
    pub is_host: Option<bool>,
}

impl PlayerDto {
    pub fn participant_id(&self) -> ParticipantId {
        ParticipantId::new(self.id.clone())
    }

    /// The strategy mark assigned to this player, if any.
    pub fn mark_symbol(&self) -> Option<Symbol> {
        match &self.mark {
            Some(CellValueDto::Text(text)) => Symbol::from_str(text).ok(),
            Some(CellValueDto::Number(_)) | None => None,
        }
    }
}

/// Full authoritative state of one game.
///
/// Authorities name the id and winner fields inconsistently and sometimes
/// send both spellings, so each spelling gets its own field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateDto {
    #[serde(default, alias = "Id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, alias = "GameId", skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(default, alias = "GameType", skip_serializing_if = "Option::is_none")]
    pub game_type: Option<String>,
    #[serde(alias = "Board")]
    pub board: Vec<CellDto>,
    #[serde(alias = "Status")]
    pub status: String,
    #[serde(default, alias = "TurnPlayerId")]
    pub turn_player_id: Option<String>,
    #[serde(default, alias = "Winner", skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    #[serde(default, alias = "WinnerId", skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<String>,
    #[serde(default, alias = "Players")]
    pub players: Vec<PlayerDto>,
}

/// Status names used when this side produces a payload.
pub fn status_wire_name(status: GameStatus) -> &'static str {
    match status {
        GameStatus::Idle => "Waiting",
        GameStatus::Ongoing => "InProgress",
        GameStatus::Finished => "Finished",
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl GameStateDto {
    /// Validate and convert into a domain snapshot.
    pub fn to_snapshot(&self) -> Result<Snapshot, ProtocolError> {
        let status = GameStatus::from_str(&self.status)
            .map_err(|_| ProtocolError::UnknownStatus(self.status.clone()))?;
        let cells = self
            .board
            .iter()
            .map(CellDto::to_cell)
            .collect::<Result<Vec<_>, _>>()?;
        let board = Board::from_cells(cells)?;

        Ok(Snapshot {
            board,
            status,
            turn_holder: non_empty(&self.turn_player_id).map(ParticipantId::new),
            winner: non_empty(&self.winner)
                .or_else(|| non_empty(&self.winner_id))
                .map(ParticipantId::new),
        })
    }

    /// Remote game id under whichever spelling the authority used.
    pub fn resolved_id(&self) -> Option<&str> {
        non_empty(&self.id).or_else(|| non_empty(&self.game_id))
    }

    /// Game kind named in the payload, if the authority sent one.
    pub fn game_kind(&self) -> Result<Option<GameKind>, ProtocolError> {
        match non_empty(&self.game_type) {
            Some(name) => GameKind::from_str(name)
                .map(Some)
                .map_err(|_| ProtocolError::UnknownGameType(name.to_string())),
            None => Ok(None),
        }
    }

    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            id: None,
            game_id: None,
            game_type: None,
            board: snapshot.board.cells().iter().map(CellDto::from).collect(),
            status: status_wire_name(snapshot.status).to_string(),
            turn_player_id: snapshot.turn_holder.as_ref().map(|p| p.to_string()),
            winner: snapshot.winner.as_ref().map(|p| p.to_string()),
            winner_id: None,
            players: Vec::new(),
        }
    }

    pub fn with_game(mut self, id: impl Into<String>, kind: GameKind) -> Self {
        self.id = Some(id.into());
        self.game_type = Some(kind.wire_name().to_string());
        self
    }
}
