//! Local Game Controller: single-process games against the scripted opponent.
//!
//! Invalid moves are no-ops. The controller reports them as
//! [`MoveResult::Ignored`] / [`RevealOutcome::Ignored`] instead of erroring.

use rand::Rng;

use crate::board::{Board, BoardSize, Symbol};
use crate::ids::ParticipantId;
use crate::rules::memory::{generate_sequence, MemoryProgress, RevealOutcome};
use crate::rules::strategy::{choose_opponent_move, is_draw, winner_of};
use crate::session::{GameKind, GameSession, GameStatus};
use crate::stats::{GameOutcome, GameStats};

/// Result of a strategy move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveResult {
    /// Not accepted: wrong turn, occupied cell, or no ongoing game.
    Ignored,
    /// Accepted; `next` holds the turn.
    Placed {
        position: usize,
        next: ParticipantId,
    },
    Won {
        position: usize,
        winner: ParticipantId,
    },
    Draw {
        position: usize,
    },
}

impl MoveResult {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MoveResult::Won { .. } | MoveResult::Draw { .. })
    }
}

/// Symbol each local seat plays.
pub fn symbol_for(seat: &ParticipantId) -> Symbol {
    if *seat == ParticipantId::player_two() {
        Symbol::O
    } else {
        Symbol::X
    }
}

#[derive(Debug, Clone)]
pub struct LocalGameController {
    session: GameSession,
    memory: Option<MemoryProgress>,
    stats: GameStats,
}

impl Default for LocalGameController {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalGameController {
    pub fn new() -> Self {
        Self {
            session: GameSession::idle(GameKind::Strategy3x3),
            memory: None,
            stats: GameStats::new(),
        }
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn stats(&self) -> &GameStats {
        &self.stats
    }

    pub fn memory_progress(&self) -> Option<&MemoryProgress> {
        self.memory.as_ref()
    }

    /// Replace the live session with a fresh tic-tac-toe game. Player one moves first.
    pub fn start_strategy(&mut self) {
        self.session = GameSession::local(
            GameKind::Strategy3x3,
            Board::new(BoardSize::Classic),
            Some(ParticipantId::player_one()),
        );
        self.memory = None;
    }

    /// Replace the live session with a fresh memory round of `size` hidden numbers.
    pub fn start_memory<R: Rng + ?Sized>(&mut self, size: BoardSize, rng: &mut R) {
        let values = generate_sequence(size.cells(), rng);
        self.session = GameSession::local(
            GameKind::MemorySequence,
            Board::with_values(size, &values),
            None,
        );
        self.memory = Some(MemoryProgress::new(size.cells()));
    }

    /// Drop the live session and go back to `Idle`.
    pub fn reset(&mut self) {
        self.session = GameSession::idle(self.session.game_kind());
        self.memory = None;
    }

    /// Place `actor`'s mark at `position`.
    pub fn play(&mut self, actor: &ParticipantId, position: usize) -> MoveResult {
        if self.session.game_kind() != GameKind::Strategy3x3
            || self.session.status() != GameStatus::Ongoing
            || self.session.turn_holder() != Some(actor)
        {
            return MoveResult::Ignored;
        }

        let symbol = symbol_for(actor);
        if !self.session.board_mut().place(position, symbol) {
            return MoveResult::Ignored;
        }

        if winner_of(self.session.board()) == Some(symbol) {
            self.session.finish();
            let outcome = if *actor == ParticipantId::player_one() {
                GameOutcome::Win
            } else {
                GameOutcome::Loss
            };
            self.record(outcome);
            return MoveResult::Won {
                position,
                winner: actor.clone(),
            };
        }
        if is_draw(self.session.board()) {
            self.session.finish();
            self.record(GameOutcome::Draw);
            return MoveResult::Draw { position };
        }

        let next = if *actor == ParticipantId::player_one() {
            ParticipantId::player_two()
        } else {
            ParticipantId::player_one()
        };
        self.session.set_turn_holder(Some(next.clone()));
        MoveResult::Placed { position, next }
    }

    /// Let the scripted opponent take its turn, if it holds one.
    pub fn play_opponent<R: Rng + ?Sized>(&mut self, rng: &mut R) -> MoveResult {
        let opponent = ParticipantId::player_two();
        if self.session.turn_holder() != Some(&opponent) {
            return MoveResult::Ignored;
        }
        let choice = choose_opponent_move(
            self.session.board(),
            symbol_for(&opponent),
            symbol_for(&ParticipantId::player_one()),
            rng,
        );
        match choice {
            Some(position) => self.play(&opponent, position),
            None => MoveResult::Ignored,
        }
    }

    /// Reveal a hidden memory cell.
    pub fn reveal(&mut self, position: usize) -> RevealOutcome {
        if self.session.status() != GameStatus::Ongoing {
            return RevealOutcome::Ignored;
        }
        let Some(progress) = self.memory.as_mut() else {
            return RevealOutcome::Ignored;
        };
        let value = match self.session.board().get(position) {
            Some(cell) if !cell.is_revealed() => cell.value().and_then(Symbol::as_number),
            _ => None,
        };
        let Some(value) = value else {
            return RevealOutcome::Ignored;
        };

        let outcome = progress.reveal(value);
        if outcome != RevealOutcome::Ignored {
            self.session.board_mut().reveal(position);
        }
        if outcome == RevealOutcome::Completed {
            self.session.finish();
            self.record(GameOutcome::Win);
        }
        outcome
    }

    /// Apply a pending flip-back. Returns false if none was pending.
    pub fn complete_flip_back(&mut self) -> bool {
        match self.memory.as_mut() {
            Some(progress) if progress.is_reset_pending() => {
                progress.reset();
                self.session.board_mut().hide_all();
                true
            }
            _ => false,
        }
    }

    fn record(&mut self, outcome: GameOutcome) {
        if let Some(key) = self.session.session_id().cloned() {
            self.stats.record(&key, outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::memory::FLIP_BACK_DELAY;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn p1() -> ParticipantId {
        ParticipantId::player_one()
    }

    fn p2() -> ParticipantId {
        ParticipantId::player_two()
    }

    fn position_of(controller: &LocalGameController, value: u32) -> usize {
        controller
            .session()
            .board()
            .cells()
            .iter()
            .find(|c| c.value() == Some(Symbol::Number(value)))
            .map(|c| c.position())
            .unwrap()
    }

    #[test]
    fn test_idle_controller_ignores_moves() {
        let mut controller = LocalGameController::new();
        assert_eq!(controller.session().status(), GameStatus::Idle);
        assert_eq!(controller.play(&p1(), 0), MoveResult::Ignored);
        assert_eq!(controller.reveal(0), RevealOutcome::Ignored);
    }

    #[test]
    fn test_turns_alternate_and_wrong_turn_is_ignored() {
        let mut controller = LocalGameController::new();
        controller.start_strategy();

        assert_eq!(controller.play(&p2(), 0), MoveResult::Ignored);
        assert_eq!(
            controller.play(&p1(), 0),
            MoveResult::Placed {
                position: 0,
                next: p2()
            }
        );
        // Occupied
        assert_eq!(controller.play(&p2(), 0), MoveResult::Ignored);
        assert_eq!(controller.session().turn_holder(), Some(&p2()));
    }

    #[test]
    fn test_center_opening_gets_corner_reply() {
        let mut controller = LocalGameController::new();
        controller.start_strategy();
        let mut rng = StdRng::seed_from_u64(3);

        controller.play(&p1(), 4);
        let reply = controller.play_opponent(&mut rng);
        assert_eq!(
            reply,
            MoveResult::Placed {
                position: 0,
                next: p1()
            }
        );
    }

    #[test]
    fn test_win_records_once() {
        let mut controller = LocalGameController::new();
        controller.start_strategy();

        // X: 0,1,2   O: 3,4
        controller.play(&p1(), 0);
        controller.play(&p2(), 3);
        controller.play(&p1(), 1);
        controller.play(&p2(), 4);
        let result = controller.play(&p1(), 2);

        assert_eq!(
            result,
            MoveResult::Won {
                position: 2,
                winner: p1()
            }
        );
        assert_eq!(controller.session().status(), GameStatus::Finished);
        assert!(controller.session().turn_holder().is_none());
        assert_eq!(controller.stats().games_won, 1);

        // Terminal state: further moves ignored, nothing recorded twice
        assert_eq!(controller.play(&p2(), 5), MoveResult::Ignored);
        assert_eq!(controller.stats().games_played, 1);
    }

    #[test]
    fn test_draw_is_recorded() {
        let mut controller = LocalGameController::new();
        controller.start_strategy();
        // X O X / X O O / O X X
        for (seat, position) in [
            (p1(), 0),
            (p2(), 1),
            (p1(), 2),
            (p2(), 4),
            (p1(), 3),
            (p2(), 5),
            (p1(), 7),
            (p2(), 6),
        ] {
            assert!(!controller.play(&seat, position).is_terminal());
        }
        assert_eq!(controller.play(&p1(), 8), MoveResult::Draw { position: 8 });
        assert_eq!(controller.stats().games_drawn, 1);
    }

    #[test]
    fn test_memory_ascending_order_wins_on_last_reveal() {
        let mut controller = LocalGameController::new();
        let mut rng = StdRng::seed_from_u64(11);
        controller.start_memory(BoardSize::Classic, &mut rng);

        for value in 1..=8 {
            let position = position_of(&controller, value);
            assert_eq!(
                controller.reveal(position),
                RevealOutcome::Advanced { next: value + 1 }
            );
        }
        let last = position_of(&controller, 9);
        assert_eq!(controller.reveal(last), RevealOutcome::Completed);
        assert_eq!(controller.session().status(), GameStatus::Finished);
        assert_eq!(controller.stats().games_won, 1);
    }

    #[test]
    fn test_memory_mismatch_flips_everything_back() {
        let mut controller = LocalGameController::new();
        let mut rng = StdRng::seed_from_u64(5);
        controller.start_memory(BoardSize::Classic, &mut rng);

        let one = position_of(&controller, 1);
        let five = position_of(&controller, 5);
        controller.reveal(one);
        assert_eq!(
            controller.reveal(five),
            RevealOutcome::Mismatch {
                reset_after: FLIP_BACK_DELAY
            }
        );
        // Both shown until the flip-back fires
        assert!(controller.session().board().get(five).unwrap().is_revealed());
        let two = position_of(&controller, 2);
        assert_eq!(controller.reveal(two), RevealOutcome::Ignored);

        assert!(controller.complete_flip_back());
        assert!(controller
            .session()
            .board()
            .cells()
            .iter()
            .all(|c| !c.is_revealed()));
        assert_eq!(controller.memory_progress().unwrap().next_expected(), 1);
        assert!(!controller.complete_flip_back());
    }

    #[test]
    fn test_revealed_cell_cannot_be_revealed_again() {
        let mut controller = LocalGameController::new();
        let mut rng = StdRng::seed_from_u64(9);
        controller.start_memory(BoardSize::Small, &mut rng);

        let one = position_of(&controller, 1);
        controller.reveal(one);
        assert_eq!(controller.reveal(one), RevealOutcome::Ignored);
        assert_eq!(controller.memory_progress().unwrap().next_expected(), 2);
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut controller = LocalGameController::new();
        controller.start_strategy();
        controller.reset();
        assert_eq!(controller.session().status(), GameStatus::Idle);
        assert!(controller.session().session_id().is_none());
    }
}
