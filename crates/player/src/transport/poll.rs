//! Pull transport: REST commands plus a fixed-interval state poll.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use url::Url;

use playtogether_domain::{GameKind, ParticipantId, RemoteGameId, Snapshot};
use playtogether_shared::{
    CreateGameRequest, CreateGameResponse, GameStateDto, JoinGameRequest, JoinGameResponse,
    LeaveRequest, MoveRequest, MoveResponse, ProtocolError,
};

use super::{BackoffState, Command, EventSender, Reply, Transport, TransportEvent, TransportKind};
use crate::config::{ClientConfig, RetryPolicy};
use crate::error::SessionError;

/// Floor for the poll interval; `tokio::time::interval` rejects zero.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polling transport against the authority's `/games` REST API.
pub struct PollTransport {
    client: Client,
    base_url: String,
    interval: Duration,
    retry: RetryPolicy,
    request_timeout: Duration,
    state: Arc<Mutex<PollState>>,
}

/// Delivery state shared between command replies and the poll loop.
#[derive(Default)]
struct PollState {
    events: Option<EventSender>,
    /// Last published snapshot; the poll only republishes when this differs.
    last: Option<Snapshot>,
    /// Bumped whenever a command reply publishes, so an in-flight poll
    /// that started earlier cannot overwrite it with older state.
    revision: u64,
    poller: Option<CancellationToken>,
}

impl PollState {
    fn publish_if_changed(&mut self, snapshot: Snapshot) -> bool {
        if self.last.as_ref() == Some(&snapshot) {
            return false;
        }
        self.emit(TransportEvent::Snapshot(snapshot.clone()));
        self.last = Some(snapshot);
        true
    }

    fn emit(&self, event: TransportEvent) -> bool {
        match &self.events {
            Some(events) => events.send(event).is_ok(),
            None => false,
        }
    }

    fn stop_poller(&mut self) {
        if let Some(token) = self.poller.take() {
            token.cancel();
        }
    }
}

impl PollTransport {
    pub fn new(config: &ClientConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            interval: config.poll_interval.max(MIN_POLL_INTERVAL),
            retry: config.retry,
            request_timeout: config.request_timeout,
            state: Arc::new(Mutex::new(PollState::default())),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, SessionError> {
        endpoint(&self.base_url, segments)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &B,
        operation: &'static str,
    ) -> Result<Response, SessionError> {
        self.client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| request_error(e, operation, self.request_timeout))
    }

    async fn create(&self, kind: GameKind) -> Result<Reply, SessionError> {
        let url = self.endpoint(&["games"])?;
        let response = self
            .post(url, &CreateGameRequest::new(kind), "create")
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SessionError::send(format!(
                "Create game failed: {} {}",
                status, text
            )));
        }

        let body: CreateGameResponse = response
            .json()
            .await
            .map_err(|e| ProtocolError::malformed(e.to_string()))?;
        let game_id = body
            .resolved_game_id()
            .ok_or(ProtocolError::MissingField("gameId"))?;
        let kind = body
            .game_type
            .as_deref()
            .and_then(|name| name.parse::<GameKind>().ok())
            .unwrap_or(kind);

        tracing::info!(game_id, %kind, "Created game");
        Ok(Reply::Created {
            game_id: RemoteGameId::new(game_id),
            kind,
        })
    }

    async fn join(&self, game_id: RemoteGameId, name: String) -> Result<Reply, SessionError> {
        let url = self.endpoint(&["games", game_id.as_str(), "join"])?;
        let response = self
            .post(url, &JoinGameRequest { player_name: name }, "join")
            .await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            let text = response.text().await.unwrap_or_default();
            return Err(SessionError::join_not_found(format!(
                "Join failed: {} {}",
                status, text
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SessionError::join(format!("Join failed: {} {}", status, text)));
        }

        let body: JoinGameResponse = response
            .json()
            .await
            .map_err(|e| ProtocolError::malformed(e.to_string()))?;
        let snapshot = body.state.to_snapshot()?;
        let kind = body.state.game_kind().ok().flatten();
        let state_url = self.endpoint(&["games", game_id.as_str()])?;

        {
            let mut state = self.state.lock().await;
            state.last = None;
            state.revision += 1;
            state.publish_if_changed(snapshot);
            state.stop_poller();
            let token = CancellationToken::new();
            state.poller = Some(token.clone());
            tokio::spawn(poll_loop(PollLoop {
                client: self.client.clone(),
                url: state_url,
                interval: self.interval,
                retry: self.retry,
                state: Arc::clone(&self.state),
                token,
            }));
        }

        tracing::info!(game_id = %game_id, "Joined game, polling every {:?}", self.interval);
        Ok(Reply::Joined {
            participant_id: body.player.as_ref().map(|p| p.participant_id()),
            mark: body.player.as_ref().and_then(|p| p.mark_symbol()),
            kind,
        })
    }

    async fn submit_move(
        &self,
        game_id: RemoteGameId,
        participant_id: ParticipantId,
        position: usize,
        kind: GameKind,
    ) -> Result<Reply, SessionError> {
        let action = match kind {
            GameKind::Strategy3x3 => "move",
            GameKind::MemorySequence => "flip",
        };
        let url = self.endpoint(&["games", game_id.as_str(), action])?;
        let body = MoveRequest::new(&game_id, &participant_id, position);
        let response = self.post(url, &body, "move").await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(SessionError::send(format!("Move failed: {} {}", status, text)));
        }

        // The move is applied by now; a reply we cannot read is left for the
        // next poll to reconcile rather than reported as a failed send.
        if !text.trim().is_empty() {
            match move_reply_snapshot(&text) {
                Ok(Some(snapshot)) => {
                    let mut state = self.state.lock().await;
                    state.revision += 1;
                    state.publish_if_changed(snapshot);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    game_id = %game_id,
                    position,
                    error = %e,
                    "Ignoring unreadable move reply"
                ),
            }
        }
        Ok(Reply::Accepted)
    }

    async fn leave(
        &self,
        game_id: RemoteGameId,
        participant_id: ParticipantId,
    ) -> Result<Reply, SessionError> {
        self.state.lock().await.stop_poller();
        let url = self.endpoint(&["games", game_id.as_str(), "leave"])?;
        let body = LeaveRequest {
            player_id: participant_id.to_string(),
        };
        let response = self.post(url, &body, "leave").await?;
        if !response.status().is_success() {
            return Err(SessionError::send(format!(
                "Leave failed: {}",
                response.status()
            )));
        }
        Ok(Reply::Accepted)
    }
}

#[async_trait]
impl Transport for PollTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Poll
    }

    async fn open(&self, events: EventSender) -> Result<(), SessionError> {
        // Nothing to connect; only the base URL can be wrong at this point
        self.endpoint(&[])?;
        let mut state = self.state.lock().await;
        state.stop_poller();
        state.events = Some(events);
        state.last = None;
        Ok(())
    }

    async fn send(&self, command: Command) -> Result<Reply, SessionError> {
        match command {
            Command::Create { kind } => self.create(kind).await,
            Command::Join {
                game_id,
                participant_name,
            } => self.join(game_id, participant_name).await,
            Command::Move {
                game_id,
                participant_id,
                position,
                kind,
            } => self.submit_move(game_id, participant_id, position, kind).await,
            Command::Leave {
                game_id,
                participant_id,
            } => self.leave(game_id, participant_id).await,
        }
    }

    async fn close(&self) {
        let mut state = self.state.lock().await;
        state.stop_poller();
        state.events = None;
        state.last = None;
    }
}

struct PollLoop {
    client: Client,
    url: Url,
    interval: Duration,
    retry: RetryPolicy,
    state: Arc<Mutex<PollState>>,
    token: CancellationToken,
}

enum PollFailure {
    /// The game is gone; retrying cannot help
    Gone(String),
    Transient(String),
}

async fn poll_loop(ctx: PollLoop) {
    let mut ticker = tokio::time::interval(ctx.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the joined state was just published
    ticker.tick().await;
    let mut backoff = BackoffState::new(ctx.retry);

    loop {
        tokio::select! {
            _ = ctx.token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let revision = ctx.state.lock().await.revision;
        let result = fetch_state(&ctx.client, ctx.url.clone()).await;
        if ctx.token.is_cancelled() {
            break;
        }

        match result {
            Ok(snapshot) => {
                let mut state = ctx.state.lock().await;
                if backoff.attempts() > 0 {
                    tracing::info!("Polling recovered after {} failures", backoff.attempts());
                    backoff.reset();
                    state.emit(TransportEvent::Reconnected);
                }
                if state.revision != revision {
                    tracing::trace!("Discarding poll result superseded by a command reply");
                    continue;
                }
                if state.publish_if_changed(snapshot) {
                    tracing::debug!(url = %ctx.url, "Poll observed a new state");
                }
                if state.events.as_ref().map_or(true, |tx| tx.is_closed()) {
                    break;
                }
            }
            Err(PollFailure::Gone(reason)) => {
                tracing::warn!(url = %ctx.url, "Game vanished while polling: {}", reason);
                ctx.state
                    .lock()
                    .await
                    .emit(TransportEvent::Disconnected { reason });
                break;
            }
            Err(PollFailure::Transient(reason)) => {
                let Some(delay) = backoff.next_delay_and_advance() else {
                    tracing::error!(
                        attempts = backoff.attempts(),
                        "Polling failed too many times, giving up: {}",
                        reason
                    );
                    ctx.state.lock().await.emit(TransportEvent::Disconnected {
                        reason: format!("polling failed: {}", reason),
                    });
                    break;
                };
                tracing::warn!(
                    attempt = backoff.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    error = %reason,
                    "Poll failed"
                );
                ctx.state.lock().await.emit(TransportEvent::Reconnecting {
                    attempt: backoff.attempts(),
                    delay,
                });
                tokio::select! {
                    _ = ctx.token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
    tracing::debug!(url = %ctx.url, "Poll loop stopped");
}

async fn fetch_state(client: &Client, url: Url) -> Result<Snapshot, PollFailure> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| PollFailure::Transient(e.to_string()))?;
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(PollFailure::Gone(format!("{}", status)));
    }
    if !status.is_success() {
        return Err(PollFailure::Transient(format!("{}", status)));
    }
    let dto: GameStateDto = response
        .json()
        .await
        .map_err(|e| PollFailure::Transient(e.to_string()))?;
    dto.to_snapshot()
        .map_err(|e| PollFailure::Transient(e.to_string()))
}

fn endpoint(base_url: &str, segments: &[&str]) -> Result<Url, SessionError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| SessionError::connect(format!("Invalid API URL {}: {}", base_url, e)))?;
    url.path_segments_mut()
        .map_err(|_| SessionError::connect(format!("API URL cannot be a base: {}", base_url)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn request_error(err: reqwest::Error, operation: &'static str, after: Duration) -> SessionError {
    if err.is_timeout() {
        SessionError::timeout(operation, after)
    } else if err.is_connect() {
        SessionError::connect(err.to_string())
    } else if operation == "join" {
        SessionError::join(err.to_string())
    } else {
        SessionError::send(err.to_string())
    }
}

fn move_reply_snapshot(text: &str) -> Result<Option<Snapshot>, ProtocolError> {
    let reply: MoveResponse = serde_json::from_str(text)?;
    reply.into_state().map(|dto| dto.to_snapshot()).transpose()
}
