//! Win/loss/draw counters with a once-per-session guard.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::board::Symbol;
use crate::ids::ParticipantId;
use crate::rules::strategy::winner_of;
use crate::session::{GameKind, SessionKey, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameOutcome {
    Win,
    Loss,
    Draw,
}

impl GameOutcome {
    /// Outcome of a finished remote snapshot from one participant's seat.
    ///
    /// Uses the authority's `winner` when present. Otherwise the strategy board
    /// is inspected with `own_mark`; a board nobody won counts as a draw.
    pub fn for_participant(
        kind: GameKind,
        snapshot: &Snapshot,
        me: Option<&ParticipantId>,
        own_mark: Option<Symbol>,
    ) -> GameOutcome {
        if let Some(winner) = &snapshot.winner {
            return if Some(winner) == me {
                GameOutcome::Win
            } else {
                GameOutcome::Loss
            };
        }
        match kind {
            GameKind::Strategy3x3 => match (winner_of(&snapshot.board), own_mark) {
                (Some(symbol), Some(mine)) if symbol == mine => GameOutcome::Win,
                (Some(_), Some(_)) => GameOutcome::Loss,
                _ => GameOutcome::Draw,
            },
            GameKind::MemorySequence => {
                if snapshot.board.all_revealed() {
                    GameOutcome::Win
                } else {
                    GameOutcome::Draw
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameStats {
    pub games_played: u32,
    pub games_won: u32,
    pub games_lost: u32,
    pub games_drawn: u32,
    #[serde(skip)]
    recorded: HashSet<SessionKey>,
}

impl GameStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count `outcome` for `session` unless that session was already counted.
    ///
    /// Returns whether the counters changed.
    pub fn record(&mut self, session: &SessionKey, outcome: GameOutcome) -> bool {
        if !self.recorded.insert(session.clone()) {
            return false;
        }
        self.games_played += 1;
        match outcome {
            GameOutcome::Win => self.games_won += 1,
            GameOutcome::Loss => self.games_lost += 1,
            GameOutcome::Draw => self.games_drawn += 1,
        }
        true
    }
}
