//! Session manager behaviour against a scripted in-process authority.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use playtogether_domain::{
    Board, GameKind, GameStatus, ParticipantId, RemoteGameId, Snapshot, Symbol,
};
use playtogether_player::{
    Command, ConnectionChanged, ConnectionPhase, EventSender, GameOver, GuestNameGenerator,
    Navigator, Reply, RetryPolicy, SessionError, SessionManager, SessionPorts, Transport,
    TransportEvent, TransportKind,
};
use playtogether_player::ports::NoopRenderer;

#[derive(Default)]
struct Script {
    create_failures: u32,
    missing: HashSet<String>,
    next_game: u32,
}

/// Authority double: answers commands from a script and records them.
#[derive(Default)]
struct ScriptedAuthority {
    script: Mutex<Script>,
    events: Mutex<Option<EventSender>>,
    sent: Mutex<Vec<Command>>,
    /// When set, joins wait for this before answering
    join_gate: Option<Arc<Notify>>,
}

impl ScriptedAuthority {
    fn failing_creates(count: u32) -> Self {
        let authority = Self::default();
        authority.script.lock().unwrap().create_failures = count;
        authority
    }

    fn with_missing(game_id: &str) -> Self {
        let authority = Self::default();
        authority
            .script
            .lock()
            .unwrap()
            .missing
            .insert(game_id.to_string());
        authority
    }

    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            join_gate: Some(gate),
            ..Self::default()
        }
    }

    fn push(&self, snapshot: Snapshot) {
        self.emit(TransportEvent::Snapshot(snapshot));
    }

    fn emit(&self, event: TransportEvent) {
        if let Some(events) = self.events.lock().unwrap().as_ref() {
            let _ = events.send(event);
        }
    }

    fn sent(&self) -> Vec<Command> {
        self.sent.lock().unwrap().clone()
    }

    fn count(&self, name: &str) -> usize {
        self.sent().iter().filter(|c| c.name() == name).count()
    }
}

#[async_trait]
impl Transport for ScriptedAuthority {
    fn kind(&self) -> TransportKind {
        TransportKind::Hub
    }

    async fn open(&self, events: EventSender) -> Result<(), SessionError> {
        *self.events.lock().unwrap() = Some(events);
        Ok(())
    }

    async fn send(&self, command: Command) -> Result<Reply, SessionError> {
        self.sent.lock().unwrap().push(command.clone());
        match command {
            Command::Create { kind } => {
                let mut script = self.script.lock().unwrap();
                if script.create_failures > 0 {
                    script.create_failures -= 1;
                    return Err(SessionError::send("503 Service Unavailable"));
                }
                script.next_game += 1;
                Ok(Reply::Created {
                    game_id: RemoteGameId::new(format!("game-{}", script.next_game)),
                    kind,
                })
            }
            Command::Join { game_id, .. } => {
                if let Some(gate) = &self.join_gate {
                    gate.notified().await;
                }
                if self.script.lock().unwrap().missing.contains(game_id.as_str()) {
                    return Err(SessionError::join_not_found(format!(
                        "game {} not found",
                        game_id
                    )));
                }
                self.push(snapshot(&[], GameStatus::Ongoing));
                Ok(Reply::Joined {
                    participant_id: Some(ParticipantId::new("p1")),
                    mark: Some(Symbol::X),
                    kind: Some(GameKind::Strategy3x3),
                })
            }
            Command::Move { .. } | Command::Leave { .. } => Ok(Reply::Accepted),
        }
    }

    async fn close(&self) {
        self.events.lock().unwrap().take();
    }
}

#[derive(Default)]
struct CountingNavigator {
    homes: AtomicU32,
}

impl Navigator for CountingNavigator {
    fn navigate_home(&self) {
        self.homes.fetch_add(1, Ordering::SeqCst);
    }
}

fn snapshot(marks: &[(usize, Symbol)], status: GameStatus) -> Snapshot {
    let mut board = Board::default();
    for (position, symbol) in marks {
        board.place(*position, *symbol);
    }
    Snapshot {
        board,
        status,
        turn_holder: Some(ParticipantId::new("p1")),
        winner: None,
    }
}

fn manager_with(authority: &Arc<ScriptedAuthority>, navigator: Arc<dyn Navigator>) -> SessionManager {
    SessionManager::new(
        vec![Arc::clone(authority) as Arc<dyn Transport>],
        RetryPolicy::default(),
        SessionPorts {
            renderer: Arc::new(NoopRenderer),
            navigator,
            names: Arc::new(GuestNameGenerator),
        },
    )
}

fn manager(authority: &Arc<ScriptedAuthority>) -> SessionManager {
    manager_with(authority, Arc::new(CountingNavigator::default()))
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test(start_paused = true)]
async fn create_succeeds_on_third_attempt_after_transient_failures() {
    let authority = Arc::new(ScriptedAuthority::failing_creates(2));
    let manager = manager(&authority);

    manager
        .create_or_join(None, None, Some(GameKind::Strategy3x3))
        .await
        .unwrap();

    let state = manager.diagnostics().await;
    assert_eq!(state.phase, ConnectionPhase::Connected);
    assert_eq!(state.attempt_count, 3);
    assert_eq!(state.remote_game_id, Some(RemoteGameId::new("game-1")));
    assert_eq!(authority.count("create"), 3);
    assert_eq!(authority.count("join"), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_game_is_recreated_when_kind_is_known() {
    let authority = Arc::new(ScriptedAuthority::with_missing("stale"));
    let manager = manager(&authority);

    manager
        .create_or_join(
            Some(RemoteGameId::new("stale")),
            Some("Ada".into()),
            Some(GameKind::Strategy3x3),
        )
        .await
        .unwrap();

    let state = manager.diagnostics().await;
    assert_eq!(state.phase, ConnectionPhase::Connected);
    assert_eq!(state.remote_game_id, Some(RemoteGameId::new("game-1")));
    assert_eq!(state.attempt_count, 1);
    assert!(state.last_error.is_none());

    let names: Vec<_> = authority.sent().iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["join", "create", "join"]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_calls_share_one_attempt() {
    let authority = Arc::new(ScriptedAuthority::default());
    let manager = manager(&authority);

    let (first, second) = tokio::join!(
        manager.create_or_join(None, None, Some(GameKind::Strategy3x3)),
        manager.create_or_join(None, None, Some(GameKind::MemorySequence)),
    );

    assert!(first.is_ok());
    assert_eq!(first, second);
    assert_eq!(authority.count("create"), 1);
    assert_eq!(
        manager.diagnostics().await.game_kind,
        Some(GameKind::Strategy3x3)
    );
}

#[tokio::test(start_paused = true)]
async fn leave_cancels_in_flight_join_and_drops_late_snapshots() {
    let gate = Arc::new(Notify::new());
    let authority = Arc::new(ScriptedAuthority::gated(Arc::clone(&gate)));
    let manager = manager(&authority);

    let attempt = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager
                .create_or_join(Some(RemoteGameId::new("g1")), None, None)
                .await
        })
    };
    settle().await;
    assert_eq!(manager.diagnostics().await.phase, ConnectionPhase::Connecting);

    manager.leave().await;
    assert_eq!(attempt.await.unwrap(), Err(SessionError::Cancelled));

    // The authority answers late; nothing of it may reach the session
    gate.notify_one();
    authority.push(snapshot(&[(4, Symbol::O)], GameStatus::Ongoing));
    settle().await;

    assert_eq!(manager.diagnostics().await.phase, ConnectionPhase::Disconnected);
    assert_eq!(manager.session().await.board().value_at(4), None);
}

#[tokio::test(start_paused = true)]
async fn game_over_fires_once_for_repeated_finished_snapshots() {
    let authority = Arc::new(ScriptedAuthority::default());
    let manager = manager(&authority);
    let over = Arc::new(AtomicU32::new(0));
    {
        let over = Arc::clone(&over);
        manager
            .on_game_over(move |_: GameOver| {
                over.fetch_add(1, Ordering::SeqCst);
            })
            .await;
    }
    manager
        .create_or_join(Some(RemoteGameId::new("g1")), None, None)
        .await
        .unwrap();

    let won = snapshot(
        &[(0, Symbol::X), (4, Symbol::X), (8, Symbol::X)],
        GameStatus::Finished,
    );
    authority.push(won.clone());
    authority.push(won);
    settle().await;

    assert_eq!(over.load(Ordering::SeqCst), 1);
    let stats = manager.stats().await;
    assert_eq!(stats.games_played, 1);
    assert_eq!(stats.games_won, 1);
}

#[tokio::test(start_paused = true)]
async fn board_updates_arrive_in_transport_order() {
    let authority = Arc::new(ScriptedAuthority::default());
    let manager = manager(&authority);
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        manager
            .on_board_updated(move |update| {
                let marks = update.board.cells().iter().filter(|c| !c.is_empty()).count();
                seen.lock().unwrap().push(marks);
            })
            .await;
    }
    manager
        .create_or_join(Some(RemoteGameId::new("g1")), None, None)
        .await
        .unwrap();

    authority.push(snapshot(&[(0, Symbol::X)], GameStatus::Ongoing));
    authority.push(snapshot(&[(0, Symbol::X), (4, Symbol::O)], GameStatus::Ongoing));
    settle().await;

    // Join snapshot first, then the two pushes
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
}

#[tokio::test(start_paused = true)]
async fn reconnect_cycle_is_reflected_in_phase() {
    let authority = Arc::new(ScriptedAuthority::default());
    let manager = manager(&authority);
    let phases = Arc::new(Mutex::new(Vec::new()));
    {
        let phases = Arc::clone(&phases);
        manager
            .on_connection_changed(move |change: ConnectionChanged| {
                phases.lock().unwrap().push(change.phase)
            })
            .await;
    }
    manager
        .create_or_join(Some(RemoteGameId::new("g1")), None, None)
        .await
        .unwrap();

    authority.emit(TransportEvent::Reconnecting {
        attempt: 1,
        delay: Duration::from_secs(1),
    });
    settle().await;
    let state = manager.diagnostics().await;
    assert_eq!(state.phase, ConnectionPhase::Reconnecting);
    assert_eq!(state.reconnect_attempt, 1);
    assert_eq!(manager.submit_move(0).await, Err(SessionError::NotConnected));

    authority.emit(TransportEvent::Reconnected);
    settle().await;
    assert_eq!(manager.diagnostics().await.phase, ConnectionPhase::Connected);

    assert_eq!(
        *phases.lock().unwrap(),
        vec![
            ConnectionPhase::Connecting,
            ConnectionPhase::Connected,
            ConnectionPhase::Reconnecting,
            ConnectionPhase::Connected,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn terminal_disconnect_navigates_home() {
    let authority = Arc::new(ScriptedAuthority::default());
    let navigator = Arc::new(CountingNavigator::default());
    let manager = manager_with(&authority, Arc::clone(&navigator) as Arc<dyn Navigator>);
    manager
        .create_or_join(Some(RemoteGameId::new("g1")), None, None)
        .await
        .unwrap();

    authority.emit(TransportEvent::Disconnected {
        reason: "Gave up after 5 reconnection attempts".into(),
    });
    settle().await;

    let state = manager.diagnostics().await;
    assert_eq!(state.phase, ConnectionPhase::Disconnected);
    assert!(state.last_error.unwrap().contains("Gave up"));
    assert_eq!(navigator.homes.load(Ordering::SeqCst), 1);

    // Caller may start over
    manager
        .create_or_join(Some(RemoteGameId::new("g1")), None, None)
        .await
        .unwrap();
    assert_eq!(manager.diagnostics().await.phase, ConnectionPhase::Connected);
}

#[tokio::test(start_paused = true)]
async fn move_is_forwarded_without_touching_the_board() {
    let authority = Arc::new(ScriptedAuthority::default());
    let manager = manager(&authority);
    manager
        .create_or_join(Some(RemoteGameId::new("g1")), None, None)
        .await
        .unwrap();

    manager.submit_move(4).await.unwrap();
    settle().await;

    assert_eq!(manager.session().await.board().value_at(4), None);
    let moves: Vec<_> = authority
        .sent()
        .into_iter()
        .filter_map(|c| match c {
            Command::Move {
                position,
                participant_id,
                ..
            } => Some((position, participant_id)),
            _ => None,
        })
        .collect();
    assert_eq!(moves, vec![(4, ParticipantId::new("p1"))]);
}

#[tokio::test(start_paused = true)]
async fn leaving_twice_sends_one_leave() {
    let authority = Arc::new(ScriptedAuthority::default());
    let manager = manager(&authority);
    manager
        .create_or_join(Some(RemoteGameId::new("g1")), None, None)
        .await
        .unwrap();

    manager.leave().await;
    let after_first = manager.diagnostics().await;
    manager.leave().await;

    assert_eq!(manager.diagnostics().await, after_first);
    assert_eq!(after_first.phase, ConnectionPhase::Disconnected);
    assert_eq!(authority.count("leave"), 1);
}
