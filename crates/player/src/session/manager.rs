//! Session Manager: owns the connection lifecycle for one player context.
//!
//! Every create/join and every leave starts a new *generation*. Events,
//! snapshots and state writes carry the generation they were produced for
//! and are dropped once it is stale, so a cancelled attempt can never touch
//! the live session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use playtogether_domain::{
    GameKind, GameSession, GameStats, ParticipantId, RemoteGameId, SessionId, Symbol,
};
use playtogether_shared::ProtocolError;

use super::{ConnectionPhase, ConnectionState, ReconciliationSink};
use crate::config::{ClientConfig, RetryPolicy};
use crate::error::SessionError;
use crate::events::{BoardUpdated, ConnectionChanged, EventBus, GameOver};
use crate::ports::{
    BoardRenderer, GuestNameGenerator, NameGenerator, Navigator, NoopNavigator, NoopRenderer,
};
use crate::transport::{self, Command, EventSender, Reply, Transport, TransportEvent};

type AttemptFuture = Shared<BoxFuture<'static, Result<(), SessionError>>>;

/// Front-end collaborators used by the manager.
#[derive(Clone)]
pub struct SessionPorts {
    pub renderer: Arc<dyn BoardRenderer>,
    pub navigator: Arc<dyn Navigator>,
    pub names: Arc<dyn NameGenerator>,
}

impl Default for SessionPorts {
    fn default() -> Self {
        Self {
            renderer: Arc::new(NoopRenderer),
            navigator: Arc::new(NoopNavigator),
            names: Arc::new(GuestNameGenerator),
        }
    }
}

struct InFlight {
    id: u64,
    future: AttemptFuture,
}

struct Lifecycle {
    generation: u64,
    token: CancellationToken,
}

/// Result of one successful create/join attempt.
struct Joined {
    transport: Arc<dyn Transport>,
    game_id: RemoteGameId,
    participant_id: Option<ParticipantId>,
    mark: Option<Symbol>,
    kind: GameKind,
}

struct Inner {
    transports: Vec<Arc<dyn Transport>>,
    retry: RetryPolicy,
    names: Arc<dyn NameGenerator>,
    navigator: Arc<dyn Navigator>,
    // Lock order: lifecycle, then active / state / sink. Never hold two of
    // the latter three at once.
    lifecycle: Mutex<Lifecycle>,
    state: RwLock<ConnectionState>,
    sink: Mutex<ReconciliationSink>,
    active: Mutex<Option<Arc<dyn Transport>>>,
    flight: Mutex<Option<InFlight>>,
    next_flight: AtomicU64,
    connection_events: EventBus<ConnectionChanged>,
    board_updates: EventBus<BoardUpdated>,
    game_over: EventBus<GameOver>,
}

/// Handle to the session layer. Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// `transports` are tried in order when opening; later ones are
    /// fallbacks used only when an earlier one is unreachable.
    pub fn new(transports: Vec<Arc<dyn Transport>>, retry: RetryPolicy, ports: SessionPorts) -> Self {
        let board_updates = EventBus::new();
        let game_over = EventBus::new();
        let sink = ReconciliationSink::new(ports.renderer, board_updates.clone(), game_over.clone());
        Self {
            inner: Arc::new(Inner {
                transports,
                retry,
                names: ports.names,
                navigator: ports.navigator,
                lifecycle: Mutex::new(Lifecycle {
                    generation: 0,
                    token: CancellationToken::new(),
                }),
                state: RwLock::new(ConnectionState::default()),
                sink: Mutex::new(sink),
                active: Mutex::new(None),
                flight: Mutex::new(None),
                next_flight: AtomicU64::new(1),
                connection_events: EventBus::new(),
                board_updates,
                game_over,
            }),
        }
    }

    pub fn from_config(config: &ClientConfig, ports: SessionPorts) -> Self {
        Self::new(transport::transports_for(config), config.retry, ports)
    }

    /// Create and/or join a remote session.
    ///
    /// Without `game_id` a new session of `kind` is created first. With it,
    /// the session is joined directly; if the authority reports it missing
    /// and `kind` is known, a fresh session is created and joined instead.
    ///
    /// While an attempt is in flight, further calls wait for that attempt
    /// and receive its result; their own arguments are ignored.
    pub async fn create_or_join(
        &self,
        game_id: Option<RemoteGameId>,
        participant_name: Option<String>,
        kind: Option<GameKind>,
    ) -> Result<(), SessionError> {
        let future = {
            let mut flight = self.inner.flight.lock().await;
            match flight.as_ref() {
                Some(existing) => {
                    tracing::debug!(flight = existing.id, "Joining in-flight create_or_join");
                    existing.future.clone()
                }
                None => {
                    if game_id.is_none() && kind.is_none() {
                        return Err(SessionError::MissingGameKind);
                    }
                    // The generation belongs to this flight from the moment it
                    // is registered, so a leave() racing the spawn cancels it.
                    let (generation, token) = self.inner.teardown().await;
                    let id = self.inner.next_flight.fetch_add(1, Ordering::Relaxed);
                    let inner = Arc::clone(&self.inner);
                    let handle = tokio::spawn(async move {
                        let result = inner
                            .connect(generation, token, game_id, participant_name, kind)
                            .await;
                        let mut flight = inner.flight.lock().await;
                        if flight.as_ref().is_some_and(|f| f.id == id) {
                            *flight = None;
                        }
                        result
                    });
                    let future = async move {
                        handle.await.unwrap_or_else(|e| {
                            tracing::error!(error = %e, "create_or_join task failed");
                            Err(SessionError::Cancelled)
                        })
                    }
                    .boxed()
                    .shared();
                    *flight = Some(InFlight {
                        id,
                        future: future.clone(),
                    });
                    future
                }
            }
        };
        future.await
    }

    /// Forward a move to the authority.
    ///
    /// The local board is left untouched; the resulting board arrives as
    /// an authoritative snapshot. Failures are returned as-is, never retried.
    pub async fn submit_move(&self, position: usize) -> Result<(), SessionError> {
        let (game_id, participant_id, kind) = {
            let state = self.inner.state.read().await;
            if state.phase != ConnectionPhase::Connected {
                return Err(SessionError::NotConnected);
            }
            let game_id = state
                .remote_game_id
                .clone()
                .ok_or(SessionError::NotConnected)?;
            let participant_id = state
                .participant_id
                .clone()
                .ok_or_else(|| SessionError::send("authority did not assign a participant id"))?;
            (
                game_id,
                participant_id,
                state.game_kind.unwrap_or(GameKind::Strategy3x3),
            )
        };
        let transport = self
            .inner
            .active
            .lock()
            .await
            .clone()
            .ok_or(SessionError::NotConnected)?;

        tracing::debug!(game_id = %game_id, position, "Submitting move");
        transport
            .send(Command::Move {
                game_id,
                participant_id,
                position,
                kind,
            })
            .await
            .map(|_| ())
            .inspect_err(|e| tracing::warn!(position, error = %e, "Move rejected"))
    }

    /// Leave the current session and release the transport.
    ///
    /// Cancels any in-flight create/join and pending reconnect. Safe to call
    /// in any phase; a second call is a no-op.
    pub async fn leave(&self) {
        self.inner.flight.lock().await.take();
        self.inner.teardown().await;
    }

    /// Copy of the connection bookkeeping, for logging and debugging.
    pub async fn diagnostics(&self) -> ConnectionState {
        self.inner.state.read().await.clone()
    }

    /// Copy of the live game session.
    pub async fn session(&self) -> GameSession {
        self.inner.sink.lock().await.session().clone()
    }

    pub async fn stats(&self) -> GameStats {
        self.inner.sink.lock().await.stats().clone()
    }

    pub async fn on_board_updated(&self, callback: impl FnMut(BoardUpdated) + Send + 'static) {
        self.inner.board_updates.subscribe(callback).await;
    }

    pub async fn on_game_over(&self, callback: impl FnMut(GameOver) + Send + 'static) {
        self.inner.game_over.subscribe(callback).await;
    }

    pub async fn on_connection_changed(
        &self,
        callback: impl FnMut(ConnectionChanged) + Send + 'static,
    ) {
        self.inner.connection_events.subscribe(callback).await;
    }
}

impl Inner {
    async fn connect(
        self: &Arc<Self>,
        generation: u64,
        token: CancellationToken,
        game_id: Option<RemoteGameId>,
        participant_name: Option<String>,
        kind: Option<GameKind>,
    ) -> Result<(), SessionError> {
        if token.is_cancelled() {
            tracing::debug!(generation, "create_or_join cancelled before it started");
            return Err(SessionError::Cancelled);
        }

        let name = participant_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.names.generate());

        tracing::info!(
            game_id = ?game_id.as_ref().map(|id| id.as_str()),
            kind = ?kind,
            name = %name,
            "Starting create_or_join"
        );
        self.update(generation, |s| {
            s.phase = ConnectionPhase::Connecting;
            s.participant_name = Some(name.clone());
            s.remote_game_id = game_id.clone();
            s.game_kind = kind;
        })
        .await;

        let (events, rx) = mpsc::unbounded_channel();
        tokio::spawn(pump(Arc::downgrade(self), generation, token.clone(), rx));

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.update(generation, |s| {
                s.attempt_count = attempt;
                s.last_attempt_at = Some(Utc::now());
            })
            .await;

            let result = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(SessionError::Cancelled),
                result = self.attempt(generation, &events, game_id.clone(), &name, kind) => result,
            };

            let err = match result {
                Ok(joined) => return self.finish_connect(generation, joined).await,
                Err(err) => err,
            };
            tracing::warn!(attempt, error = %err, "create_or_join attempt failed");
            self.release_transport(generation).await;

            if matches!(err, SessionError::Cancelled) {
                return Err(err);
            }
            if !err.is_retryable() {
                self.fail(generation, &err).await;
                return Err(err);
            }
            if attempt >= self.retry.max_attempts {
                let err = SessionError::Exhausted {
                    attempts: attempt,
                    last: Box::new(err),
                };
                self.fail(generation, &err).await;
                return Err(err);
            }

            self.update(generation, |s| s.last_error = Some(err.to_string()))
                .await;
            let delay = self.retry.delay_for(attempt);
            tracing::info!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Retrying create_or_join"
            );
            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(SessionError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One pass of open, create if needed, then join.
    async fn attempt(
        &self,
        generation: u64,
        events: &EventSender,
        game_id: Option<RemoteGameId>,
        name: &str,
        kind: Option<GameKind>,
    ) -> Result<Joined, SessionError> {
        let transport = self.open_transport(generation, events).await?;

        let (game_id, known_kind) = match game_id {
            Some(id) => (id, kind),
            None => {
                let kind = kind.ok_or(SessionError::MissingGameKind)?;
                let (id, kind) = create(transport.as_ref(), kind).await?;
                (id, Some(kind))
            }
        };
        self.begin_session(generation, &game_id, known_kind).await?;

        let join = Command::Join {
            game_id: game_id.clone(),
            participant_name: name.to_string(),
        };
        let (game_id, reply) = match transport.send(join).await {
            Ok(reply) => (game_id, reply),
            Err(err) if err.is_not_found() => {
                let Some(kind) = kind else {
                    return Err(err);
                };
                tracing::info!(
                    game_id = %game_id,
                    "Remote game not found, creating a fresh one"
                );
                let (fresh, kind) = create(transport.as_ref(), kind).await?;
                self.begin_session(generation, &fresh, Some(kind)).await?;
                let reply = transport
                    .send(Command::Join {
                        game_id: fresh.clone(),
                        participant_name: name.to_string(),
                    })
                    .await?;
                (fresh, reply)
            }
            Err(err) => return Err(err),
        };

        let Reply::Joined {
            participant_id,
            mark,
            kind: reported_kind,
        } = reply
        else {
            return Err(ProtocolError::malformed("unexpected reply to join").into());
        };

        Ok(Joined {
            transport,
            game_id,
            participant_id,
            mark,
            kind: reported_kind
                .or(known_kind)
                .unwrap_or(GameKind::Strategy3x3),
        })
    }

    /// Open the first reachable transport and make it the active one.
    async fn open_transport(
        &self,
        generation: u64,
        events: &EventSender,
    ) -> Result<Arc<dyn Transport>, SessionError> {
        let mut last = SessionError::connect("no transport configured");
        for transport in &self.transports {
            match transport.open(events.clone()).await {
                Ok(()) => {
                    let lifecycle = self.lifecycle.lock().await;
                    if lifecycle.generation != generation {
                        drop(lifecycle);
                        transport.close().await;
                        return Err(SessionError::Cancelled);
                    }
                    *self.active.lock().await = Some(Arc::clone(transport));
                    self.state.write().await.transport = Some(transport.kind());
                    tracing::debug!(transport = %transport.kind(), "Transport opened");
                    return Ok(Arc::clone(transport));
                }
                Err(err) if err.is_unreachable() => {
                    tracing::warn!(
                        transport = %transport.kind(),
                        error = %err,
                        "Transport unavailable, trying the next one"
                    );
                    last = err;
                }
                Err(err) => return Err(err),
            }
        }
        Err(last)
    }

    async fn begin_session(
        &self,
        generation: u64,
        game_id: &RemoteGameId,
        kind: Option<GameKind>,
    ) -> Result<(), SessionError> {
        let lifecycle = self.lifecycle.lock().await;
        if lifecycle.generation != generation {
            return Err(SessionError::Cancelled);
        }
        self.sink
            .lock()
            .await
            .begin(game_id.clone(), kind.unwrap_or(GameKind::Strategy3x3));
        self.state.write().await.remote_game_id = Some(game_id.clone());
        Ok(())
    }

    async fn finish_connect(&self, generation: u64, joined: Joined) -> Result<(), SessionError> {
        let lifecycle = self.lifecycle.lock().await;
        if lifecycle.generation != generation {
            drop(lifecycle);
            joined.transport.close().await;
            return Err(SessionError::Cancelled);
        }

        self.sink.lock().await.bind_participant(
            joined.participant_id.clone(),
            joined.mark,
            Some(joined.kind),
        );
        let transport_kind = joined.transport.kind();
        self.update_locked(|s| {
            s.phase = ConnectionPhase::Connected;
            s.session_id = Some(SessionId::new());
            s.remote_game_id = Some(joined.game_id.clone());
            s.participant_id = joined.participant_id.clone();
            s.game_kind = Some(joined.kind);
            s.transport = Some(transport_kind);
            s.reconnect_attempt = 0;
            s.last_error = None;
        })
        .await;
        tracing::info!(
            game_id = %joined.game_id,
            participant = ?joined.participant_id.as_ref().map(|p| p.as_str()),
            transport = %transport_kind,
            "Connected to remote game"
        );
        Ok(())
    }

    async fn fail(&self, generation: u64, err: &SessionError) {
        tracing::error!(error = %err, "create_or_join failed");
        self.update(generation, |s| {
            s.phase = ConnectionPhase::Disconnected;
            s.transport = None;
            s.last_error = Some(err.to_string());
        })
        .await;
    }

    /// Close the transport opened by a failed attempt, if it is still ours.
    async fn release_transport(&self, generation: u64) {
        let transport = {
            let lifecycle = self.lifecycle.lock().await;
            if lifecycle.generation != generation {
                return;
            }
            self.active.lock().await.take()
        };
        if let Some(transport) = transport {
            transport.close().await;
        }
    }

    /// Start a new generation: cancel the old one, leave its session and
    /// reset the connection state. Returns the new generation and its token.
    async fn teardown(&self) -> (u64, CancellationToken) {
        let (generation, token, transport, previous) = {
            let mut lifecycle = self.lifecycle.lock().await;
            lifecycle.token.cancel();
            lifecycle.generation += 1;
            lifecycle.token = CancellationToken::new();

            let transport = self.active.lock().await.take();
            let previous = std::mem::take(&mut *self.state.write().await);
            self.sink.lock().await.reset();
            if previous.phase != ConnectionPhase::Disconnected {
                tracing::info!(phase = %previous.phase, "Leaving session");
                self.connection_events
                    .dispatch(ConnectionChanged {
                        phase: ConnectionPhase::Disconnected,
                        error: None,
                    })
                    .await;
            }
            (
                lifecycle.generation,
                lifecycle.token.clone(),
                transport,
                previous,
            )
        };

        if let Some(transport) = transport {
            if let (Some(game_id), Some(participant_id)) =
                (previous.remote_game_id, previous.participant_id)
            {
                let leave = Command::Leave {
                    game_id,
                    participant_id,
                };
                if let Err(e) = transport.send(leave).await {
                    tracing::debug!(error = %e, "Leave not acknowledged, ignoring");
                }
            }
            transport.close().await;
        }
        (generation, token)
    }

    /// Apply `f` to the state if `generation` is still current.
    async fn update(&self, generation: u64, f: impl FnOnce(&mut ConnectionState)) -> bool {
        let lifecycle = self.lifecycle.lock().await;
        if lifecycle.generation != generation {
            return false;
        }
        self.update_locked(f).await;
        true
    }

    /// Apply `f` to the state and announce a phase change. Caller holds `lifecycle`.
    async fn update_locked(&self, f: impl FnOnce(&mut ConnectionState)) {
        let changed = {
            let mut state = self.state.write().await;
            let before = state.phase;
            f(&mut state);
            (state.phase != before).then(|| ConnectionChanged {
                phase: state.phase,
                error: state.last_error.clone(),
            })
        };
        if let Some(event) = changed {
            tracing::debug!(phase = %event.phase, "Connection phase changed");
            self.connection_events.dispatch(event).await;
        }
    }

    async fn handle_event(&self, generation: u64, event: TransportEvent) -> bool {
        let lifecycle = self.lifecycle.lock().await;
        if lifecycle.generation != generation {
            return false;
        }
        let phase = self.state.read().await.phase;
        let live = matches!(
            phase,
            ConnectionPhase::Connected | ConnectionPhase::Reconnecting
        );

        match event {
            TransportEvent::Snapshot(snapshot) => {
                if let Err(e) = self.sink.lock().await.apply(snapshot).await {
                    tracing::warn!(error = %e, "Discarding snapshot");
                }
            }
            TransportEvent::Reconnecting { attempt, delay } if live => {
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Connection lost, reconnecting"
                );
                self.update_locked(|s| {
                    s.phase = ConnectionPhase::Reconnecting;
                    s.reconnect_attempt = attempt;
                })
                .await;
            }
            TransportEvent::Reconnected if live => {
                tracing::info!("Connection restored");
                self.update_locked(|s| {
                    s.phase = ConnectionPhase::Connected;
                    s.reconnect_attempt = 0;
                })
                .await;
            }
            TransportEvent::Disconnected { reason } if live => {
                tracing::warn!(%reason, "Remote session lost");
                self.update_locked(|s| {
                    s.phase = ConnectionPhase::Disconnected;
                    s.transport = None;
                    s.reconnect_attempt = 0;
                    s.last_error = Some(reason);
                })
                .await;
                let transport = self.active.lock().await.take();
                drop(lifecycle);
                if let Some(transport) = transport {
                    transport.close().await;
                }
                self.navigator.navigate_home();
                return false;
            }
            TransportEvent::AuthorityError { message } => {
                tracing::warn!(%message, "Authority reported an error");
                self.update_locked(|s| s.last_error = Some(message)).await;
            }
            other => {
                tracing::debug!(?other, %phase, "Ignoring transport event outside a live session");
            }
        }
        true
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.lifecycle.get_mut().token.cancel();
    }
}

/// Deliver one generation's transport events, in arrival order.
async fn pump(
    inner: Weak<Inner>,
    generation: u64,
    token: CancellationToken,
    mut rx: mpsc::UnboundedReceiver<TransportEvent>,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if !inner.handle_event(generation, event).await {
            break;
        }
    }
    tracing::debug!(generation, "Event pump stopped");
}

async fn create(
    transport: &dyn Transport,
    kind: GameKind,
) -> Result<(RemoteGameId, GameKind), SessionError> {
    match transport.send(Command::Create { kind }).await? {
        Reply::Created { game_id, kind } => {
            tracing::info!(game_id = %game_id, kind = %kind, "Created remote game");
            Ok((game_id, kind))
        }
        _ => Err(ProtocolError::malformed("unexpected reply to create").into()),
    }
}
