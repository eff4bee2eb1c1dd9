//! Async runner for local games against the scripted opponent.
//!
//! Wraps [`LocalGameController`] with the timing the controller leaves to
//! its caller: the opponent answers right after the player, and a memory
//! mismatch flips the board back after [`RevealOutcome::Mismatch`]'s delay.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use playtogether_domain::{
    BoardSize, GameOutcome, GameSession, GameStats, LocalGameController, MoveResult,
    ParticipantId, RevealOutcome, Snapshot,
};

use crate::events::{BoardUpdated, EventBus, GameOver};
use crate::ports::BoardRenderer;

/// The player's move and the opponent's answer, if it got to move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTurn {
    pub player: MoveResult,
    pub opponent: Option<MoveResult>,
}

struct LocalState {
    controller: LocalGameController,
    rng: StdRng,
    flip_back: Option<CancellationToken>,
}

impl LocalState {
    fn cancel_flip_back(&mut self) {
        if let Some(token) = self.flip_back.take() {
            token.cancel();
        }
    }
}

struct LocalInner {
    state: Mutex<LocalState>,
    renderer: Arc<dyn BoardRenderer>,
    board_updates: EventBus<BoardUpdated>,
    game_over: EventBus<GameOver>,
}

#[derive(Clone)]
pub struct LocalSession {
    inner: Arc<LocalInner>,
}

impl LocalSession {
    pub fn new(renderer: Arc<dyn BoardRenderer>) -> Self {
        Self::with_rng(renderer, StdRng::from_entropy())
    }

    pub fn with_rng(renderer: Arc<dyn BoardRenderer>, rng: StdRng) -> Self {
        Self {
            inner: Arc::new(LocalInner {
                state: Mutex::new(LocalState {
                    controller: LocalGameController::new(),
                    rng,
                    flip_back: None,
                }),
                renderer,
                board_updates: EventBus::new(),
                game_over: EventBus::new(),
            }),
        }
    }

    pub async fn start_strategy(&self) {
        let mut state = self.inner.state.lock().await;
        state.cancel_flip_back();
        state.controller.start_strategy();
        tracing::debug!("Started local tic-tac-toe");
        self.inner.publish(&state.controller).await;
    }

    pub async fn start_memory(&self, size: BoardSize) {
        let mut state = self.inner.state.lock().await;
        state.cancel_flip_back();
        let LocalState {
            controller, rng, ..
        } = &mut *state;
        controller.start_memory(size, rng);
        tracing::debug!(cells = size.cells(), "Started local memory round");
        self.inner.publish(&state.controller).await;
    }

    /// Back to idle, dropping any pending flip-back.
    pub async fn reset(&self) {
        let mut state = self.inner.state.lock().await;
        state.cancel_flip_back();
        state.controller.reset();
        self.inner.publish(&state.controller).await;
    }

    /// Place the player's mark, then let the opponent answer.
    pub async fn play(&self, position: usize) -> LocalTurn {
        let mut state = self.inner.state.lock().await;
        let player = state
            .controller
            .play(&ParticipantId::player_one(), position);
        if player == MoveResult::Ignored {
            return LocalTurn {
                player,
                opponent: None,
            };
        }

        let opponent = if player.is_terminal() {
            None
        } else {
            let LocalState {
                controller, rng, ..
            } = &mut *state;
            Some(controller.play_opponent(rng))
        };

        self.inner.publish(&state.controller).await;
        let last = opponent.as_ref().unwrap_or(&player);
        if let Some(outcome) = outcome_of(last) {
            let winner = match last {
                MoveResult::Won { winner, .. } => Some(winner.clone()),
                _ => None,
            };
            self.inner
                .finish(&state.controller, outcome, winner)
                .await;
        }
        LocalTurn { player, opponent }
    }

    /// Reveal a memory cell. A mismatch schedules the flip-back.
    pub async fn reveal(&self, position: usize) -> RevealOutcome {
        let mut state = self.inner.state.lock().await;
        let outcome = state.controller.reveal(position);
        match outcome {
            RevealOutcome::Ignored => return outcome,
            RevealOutcome::Mismatch { reset_after } => {
                let token = CancellationToken::new();
                state.cancel_flip_back();
                state.flip_back = Some(token.clone());
                tokio::spawn(flip_back(Arc::clone(&self.inner), token, reset_after));
            }
            RevealOutcome::Advanced { .. } | RevealOutcome::Completed => {}
        }

        self.inner.publish(&state.controller).await;
        if outcome == RevealOutcome::Completed {
            self.inner
                .finish(&state.controller, GameOutcome::Win, None)
                .await;
        }
        outcome
    }

    pub async fn session(&self) -> GameSession {
        self.inner.state.lock().await.controller.session().clone()
    }

    pub async fn stats(&self) -> GameStats {
        self.inner.state.lock().await.controller.stats().clone()
    }

    /// Memory value expected next, if a memory round is running.
    pub async fn next_expected(&self) -> Option<u32> {
        self.inner
            .state
            .lock()
            .await
            .controller
            .memory_progress()
            .map(|p| p.next_expected())
    }

    pub async fn on_board_updated(&self, callback: impl FnMut(BoardUpdated) + Send + 'static) {
        self.inner.board_updates.subscribe(callback).await;
    }

    pub async fn on_game_over(&self, callback: impl FnMut(GameOver) + Send + 'static) {
        self.inner.game_over.subscribe(callback).await;
    }
}

impl LocalInner {
    async fn publish(&self, controller: &LocalGameController) {
        let session = controller.session();
        self.renderer.render(session.board());
        self.board_updates
            .dispatch(BoardUpdated {
                board: session.board().clone(),
                status: session.status(),
            })
            .await;
    }

    async fn finish(
        &self,
        controller: &LocalGameController,
        outcome: GameOutcome,
        winner: Option<ParticipantId>,
    ) {
        let session = controller.session();
        tracing::info!(?outcome, kind = %session.game_kind(), "Local game over");
        self.game_over
            .dispatch(GameOver {
                game_id: None,
                snapshot: Snapshot {
                    board: session.board().clone(),
                    status: session.status(),
                    turn_holder: None,
                    winner,
                },
                outcome,
            })
            .await;
    }
}

async fn flip_back(inner: Arc<LocalInner>, token: CancellationToken, after: std::time::Duration) {
    tokio::select! {
        _ = token.cancelled() => return,
        _ = tokio::time::sleep(after) => {}
    }
    let mut state = inner.state.lock().await;
    // A restart between the timer firing and taking the lock cancels us too
    if token.is_cancelled() {
        return;
    }
    state.flip_back = None;
    if state.controller.complete_flip_back() {
        tracing::debug!("Memory board flipped back");
        inner.publish(&state.controller).await;
    }
}

/// Outcome from the human seat, for terminal results.
fn outcome_of(result: &MoveResult) -> Option<GameOutcome> {
    match result {
        MoveResult::Won { winner, .. } if *winner == ParticipantId::player_one() => {
            Some(GameOutcome::Win)
        }
        MoveResult::Won { .. } => Some(GameOutcome::Loss),
        MoveResult::Draw { .. } => Some(GameOutcome::Draw),
        MoveResult::Placed { .. } | MoveResult::Ignored => None,
    }
}
