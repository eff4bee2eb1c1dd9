//! Game session aggregate and the authoritative snapshot that replaces it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::board::{Board, BoardSize};
use crate::error::DomainError;
use crate::ids::{ParticipantId, RemoteGameId, SessionId};

/// Which mini-game a session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameKind {
    /// 3x3 tic-tac-toe
    Strategy3x3,
    /// Number-sequence memory race
    MemorySequence,
}

impl GameKind {
    /// Name used by the Remote Authority (`gameType`).
    pub fn wire_name(self) -> &'static str {
        match self {
            GameKind::Strategy3x3 => "TicTacToe",
            GameKind::MemorySequence => "MemoryRace",
        }
    }

    /// Short key used in invite links and on the command line.
    pub fn key(self) -> &'static str {
        match self {
            GameKind::Strategy3x3 => "tic-tac-toe",
            GameKind::MemorySequence => "memory-race",
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for GameKind {
    type Err = DomainError;

    /// Accepts both wire names and keys, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if lower.contains("memory") {
            Ok(GameKind::MemorySequence)
        } else if lower.contains("tic") {
            Ok(GameKind::Strategy3x3)
        } else {
            Err(DomainError::parse(format!("Unknown game kind: {}", s)))
        }
    }
}

/// Lifecycle of a session: `Idle -> Ongoing -> Finished`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameStatus {
    #[default]
    Idle,
    Ongoing,
    Finished,
}

impl GameStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, GameStatus::Finished)
    }
}

impl FromStr for GameStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "idle" | "waiting" | "waitingforplayers" => Ok(GameStatus::Idle),
            "ongoing" | "inprogress" | "in_progress" | "playing" => Ok(GameStatus::Ongoing),
            "finished" | "completed" | "over" => Ok(GameStatus::Finished),
            other => Err(DomainError::parse(format!("Unknown game status: {}", other))),
        }
    }
}

/// Complete authoritative description of a session from the Remote Authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub board: Board,
    pub status: GameStatus,
    pub turn_holder: Option<ParticipantId>,
    /// Set by the authority once a finished session has a winner.
    pub winner: Option<ParticipantId>,
}

/// Identity of the live session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionKey {
    Local(SessionId),
    Remote(RemoteGameId),
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKey::Local(id) => write!(f, "local:{}", id),
            SessionKey::Remote(id) => write!(f, "remote:{}", id),
        }
    }
}

/// The one live game per player context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSession {
    session_id: Option<SessionKey>,
    game_kind: GameKind,
    board: Board,
    turn_holder: Option<ParticipantId>,
    status: GameStatus,
    /// Whether an authoritative board has fixed the length yet
    board_fixed: bool,
}

impl GameSession {
    /// An empty session, before any start/create command.
    pub fn idle(game_kind: GameKind) -> Self {
        Self {
            session_id: None,
            game_kind,
            board: Board::default(),
            turn_holder: None,
            status: GameStatus::Idle,
            board_fixed: false,
        }
    }

    /// A fresh local session, already `Ongoing`.
    pub fn local(game_kind: GameKind, board: Board, first_turn: Option<ParticipantId>) -> Self {
        Self {
            session_id: Some(SessionKey::Local(SessionId::new())),
            game_kind,
            board,
            turn_holder: first_turn,
            status: GameStatus::Ongoing,
            board_fixed: true,
        }
    }

    /// A remote session awaiting its first authoritative snapshot.
    pub fn remote(game_id: RemoteGameId, game_kind: GameKind) -> Self {
        Self {
            session_id: Some(SessionKey::Remote(game_id)),
            game_kind,
            board: Board::new(BoardSize::Classic),
            turn_holder: None,
            status: GameStatus::Idle,
            board_fixed: false,
        }
    }

    pub fn session_id(&self) -> Option<&SessionKey> {
        self.session_id.as_ref()
    }

    pub fn game_kind(&self) -> GameKind {
        self.game_kind
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn_holder(&self) -> Option<&ParticipantId> {
        self.turn_holder.as_ref()
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.session_id, Some(SessionKey::Remote(_)))
    }

    /// Replace board, status and turn holder wholesale from an authoritative snapshot.
    ///
    /// The first snapshot fixes the board length; later snapshots of a
    /// different length are rejected and leave the session untouched.
    pub fn replace_from(&mut self, snapshot: &Snapshot) -> Result<(), DomainError> {
        if self.board_fixed && snapshot.board.len() != self.board.len() {
            return Err(DomainError::invalid_state_transition(format!(
                "board length changed from {} to {}",
                self.board.len(),
                snapshot.board.len()
            )));
        }
        self.board = snapshot.board.clone();
        self.status = snapshot.status;
        self.turn_holder = match snapshot.status {
            GameStatus::Ongoing => snapshot.turn_holder.clone(),
            _ => None,
        };
        self.board_fixed = true;
        Ok(())
    }

    /// Correct the kind of a remote session once the authority names it.
    ///
    /// Local sessions keep the kind they were started with.
    pub fn set_remote_kind(&mut self, kind: GameKind) {
        if self.is_remote() {
            self.game_kind = kind;
        }
    }

    pub(crate) fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub(crate) fn set_turn_holder(&mut self, holder: Option<ParticipantId>) {
        self.turn_holder = holder;
    }

    pub(crate) fn finish(&mut self) {
        self.status = GameStatus::Finished;
        self.turn_holder = None;
    }
}
