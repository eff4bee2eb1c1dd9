//! PlayTogether domain: the two mini-games and their session model.
//!
//! Pure logic only. Randomness is injected by callers and there is no I/O,
//! so the same rules drive local play and reconcile remote snapshots.

pub mod board;
pub mod controller;
pub mod error;
pub mod ids;
pub mod rules;
pub mod session;
pub mod stats;

pub use board::{Board, BoardSize, Cell, Symbol};
pub use controller::{symbol_for, LocalGameController, MoveResult};
pub use error::DomainError;
pub use ids::{ParticipantId, RemoteGameId, SessionId};
pub use rules::{
    choose_opponent_move, generate_sequence, is_draw, winner_of, MemoryProgress, RevealOutcome,
    FLIP_BACK_DELAY,
};
pub use session::{GameKind, GameSession, GameStatus, SessionKey, Snapshot};
pub use stats::{GameOutcome, GameStats};
