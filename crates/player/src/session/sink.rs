//! Reconciliation Sink: authoritative snapshots replace the local session.
//!
//! Snapshots are never merged field by field. Game over is edge-triggered:
//! it fires on the transition into `Finished`, not on every finished snapshot.

use std::sync::Arc;

use playtogether_domain::{
    DomainError, GameKind, GameOutcome, GameSession, GameStats, ParticipantId, RemoteGameId,
    SessionKey, Snapshot, Symbol,
};

use crate::events::{BoardUpdated, EventBus, GameOver};
use crate::ports::BoardRenderer;

pub struct ReconciliationSink {
    session: GameSession,
    participant: Option<ParticipantId>,
    own_mark: Option<Symbol>,
    stats: GameStats,
    renderer: Arc<dyn BoardRenderer>,
    board_updates: EventBus<BoardUpdated>,
    game_over: EventBus<GameOver>,
}

impl ReconciliationSink {
    pub fn new(
        renderer: Arc<dyn BoardRenderer>,
        board_updates: EventBus<BoardUpdated>,
        game_over: EventBus<GameOver>,
    ) -> Self {
        Self {
            session: GameSession::idle(GameKind::Strategy3x3),
            participant: None,
            own_mark: None,
            stats: GameStats::new(),
            renderer,
            board_updates,
            game_over,
        }
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn stats(&self) -> &GameStats {
        &self.stats
    }

    pub fn participant(&self) -> Option<&ParticipantId> {
        self.participant.as_ref()
    }

    /// Replace the live session with a fresh remote one awaiting its first snapshot.
    pub fn begin(&mut self, game_id: RemoteGameId, kind: GameKind) {
        self.session = GameSession::remote(game_id, kind);
        self.participant = None;
        self.own_mark = None;
    }

    /// Record who we are in the session once the join is acknowledged.
    pub fn bind_participant(
        &mut self,
        participant: Option<ParticipantId>,
        own_mark: Option<Symbol>,
        kind: Option<GameKind>,
    ) {
        self.participant = participant;
        self.own_mark = own_mark;
        if let Some(kind) = kind {
            self.session.set_remote_kind(kind);
        }
    }

    /// Drop the live session and go back to idle.
    pub fn reset(&mut self) {
        self.session = GameSession::idle(self.session.game_kind());
        self.participant = None;
        self.own_mark = None;
    }

    /// Replace board, status and turn holder from `snapshot` and notify observers.
    ///
    /// Returns whether this snapshot ended the game. A snapshot whose board
    /// length differs from the session's is rejected and nothing is published.
    pub async fn apply(&mut self, snapshot: Snapshot) -> Result<bool, DomainError> {
        let was_finished = self.session.status().is_finished();
        self.session.replace_from(&snapshot)?;

        self.renderer.render(self.session.board());
        self.board_updates
            .dispatch(BoardUpdated {
                board: self.session.board().clone(),
                status: self.session.status(),
            })
            .await;

        if was_finished || !snapshot.status.is_finished() {
            return Ok(false);
        }

        let outcome = GameOutcome::for_participant(
            self.session.game_kind(),
            &snapshot,
            self.participant.as_ref(),
            self.own_mark,
        );
        let key = self.session.session_id().cloned();
        if let Some(key) = &key {
            self.stats.record(key, outcome);
        }
        let game_id = match key {
            Some(SessionKey::Remote(id)) => Some(id),
            _ => None,
        };
        tracing::info!(?game_id, ?outcome, "Game over");
        self.game_over
            .dispatch(GameOver {
                game_id,
                snapshot,
                outcome,
            })
            .await;
        Ok(true)
    }
}
