//! Push transport: one WebSocket to the authority's hub.
//!
//! Commands are JSON [`ClientMessage`]s correlated with their
//! [`ServerMessage::Response`] by `request_id`. State pushes and command
//! replies that carry state are published from the read task, in the order
//! the socket delivered them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use playtogether_domain::{GameKind, RemoteGameId};
use playtogether_shared::{
    parse_server_message, ClientMessage, CreateGameResponse, ErrorCode, JoinGameResponse,
    MoveResponse, ParsedServerMessage, ProtocolError, ResponseResult, ServerMessage,
};

use super::{BackoffState, Command, EventSender, Reply, Transport, TransportEvent, TransportKind};
use crate::config::{ClientConfig, RetryPolicy};
use crate::error::SessionError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Pending {
    reply: oneshot::Sender<ResponseResult>,
    /// Publish the state embedded in a successful reply before resolving
    carries_state: bool,
}

/// State shared between the transport handle and its connection tasks.
#[derive(Default)]
struct HubShared {
    tx: Mutex<Option<mpsc::Sender<ClientMessage>>>,
    pending: Mutex<HashMap<String, Pending>>,
    events: Mutex<Option<EventSender>>,
    /// Re-sent after an automatic reconnect to resubscribe
    last_join: Mutex<Option<(RemoteGameId, String)>>,
    lifetime: Mutex<Option<CancellationToken>>,
}

impl HubShared {
    async fn emit(&self, event: TransportEvent) {
        if let Some(events) = self.events.lock().await.as_ref() {
            let _ = events.send(event);
        }
    }

    /// Fail every waiter. Dropping the senders wakes them with an error.
    async fn clear_pending(&self) -> usize {
        let mut pending = self.pending.lock().await;
        let count = pending.len();
        pending.clear();
        count
    }
}

#[derive(Clone)]
struct HubSettings {
    url: String,
    connect_timeout: Duration,
    request_timeout: Duration,
    retry: RetryPolicy,
}

pub struct HubTransport {
    settings: HubSettings,
    shared: Arc<HubShared>,
}

impl HubTransport {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            settings: HubSettings {
                url: websocket_url(&config.hub_url),
                connect_timeout: config.connect_timeout,
                request_timeout: config.request_timeout,
                retry: config.retry,
            },
            shared: Arc::new(HubShared::default()),
        }
    }

    pub fn url(&self) -> &str {
        &self.settings.url
    }

    async fn invoke(
        &self,
        message: ClientMessage,
        carries_state: bool,
        operation: &'static str,
    ) -> Result<ResponseResult, SessionError> {
        request(
            &self.shared,
            message,
            carries_state,
            operation,
            self.settings.request_timeout,
        )
        .await
    }
}

#[async_trait]
impl Transport for HubTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Hub
    }

    async fn open(&self, events: EventSender) -> Result<(), SessionError> {
        self.close().await;

        let stream = connect(&self.settings).await?;
        tracing::info!("Connected to hub at {}", self.settings.url);

        *self.shared.events.lock().await = Some(events);
        let token = CancellationToken::new();
        *self.shared.lifetime.lock().await = Some(token.clone());

        let tasks = attach(&self.shared, stream, token.clone()).await;
        tokio::spawn(supervise(
            self.settings.clone(),
            Arc::clone(&self.shared),
            tasks,
            token,
        ));
        Ok(())
    }

    async fn send(&self, command: Command) -> Result<Reply, SessionError> {
        let request_id = Uuid::new_v4().to_string();
        match command {
            Command::Create { kind } => {
                let message = ClientMessage::CreateGame {
                    request_id,
                    game_type: kind.wire_name().to_string(),
                };
                match self.invoke(message, false, "create").await? {
                    ResponseResult::Error { message, .. } => Err(SessionError::send(format!(
                        "Create game failed: {}",
                        message
                    ))),
                    result => {
                        let body: CreateGameResponse = result.decode()?;
                        let game_id = body
                            .resolved_game_id()
                            .ok_or(ProtocolError::MissingField("gameId"))?;
                        let kind = body
                            .game_type
                            .as_deref()
                            .and_then(|name| name.parse::<GameKind>().ok())
                            .unwrap_or(kind);
                        Ok(Reply::Created {
                            game_id: RemoteGameId::new(game_id),
                            kind,
                        })
                    }
                }
            }
            Command::Join {
                game_id,
                participant_name,
            } => {
                let message = ClientMessage::JoinGame {
                    request_id,
                    game_id: game_id.to_string(),
                    player_name: participant_name.clone(),
                };
                match self.invoke(message, true, "join").await? {
                    ResponseResult::Error {
                        code: ErrorCode::NotFound,
                        message,
                    } => Err(SessionError::join_not_found(message)),
                    ResponseResult::Error { message, .. } => Err(SessionError::join(message)),
                    result => {
                        let body: JoinGameResponse = result.decode()?;
                        *self.shared.last_join.lock().await = Some((game_id, participant_name));
                        Ok(Reply::Joined {
                            participant_id: body.player.as_ref().map(|p| p.participant_id()),
                            mark: body.player.as_ref().and_then(|p| p.mark_symbol()),
                            kind: body.state.game_kind().ok().flatten(),
                        })
                    }
                }
            }
            Command::Move {
                game_id,
                participant_id,
                position,
                kind,
            } => {
                let game_id = game_id.to_string();
                let player_id = participant_id.to_string();
                let message = match kind {
                    GameKind::Strategy3x3 => ClientMessage::MakeMove {
                        request_id,
                        game_id,
                        player_id,
                        position,
                    },
                    GameKind::MemorySequence => ClientMessage::FlipCard {
                        request_id,
                        game_id,
                        player_id,
                        position,
                    },
                };
                match self.invoke(message, true, "move").await? {
                    ResponseResult::Error { message, .. } => Err(SessionError::send(message)),
                    _ => Ok(Reply::Accepted),
                }
            }
            Command::Leave {
                game_id,
                participant_id,
            } => {
                self.shared.last_join.lock().await.take();
                let message = ClientMessage::LeaveGame {
                    request_id,
                    game_id: game_id.to_string(),
                    player_id: participant_id.to_string(),
                };
                match self.invoke(message, false, "leave").await? {
                    ResponseResult::Error { message, .. } => Err(SessionError::send(message)),
                    _ => Ok(Reply::Accepted),
                }
            }
        }
    }

    async fn close(&self) {
        if let Some(token) = self.shared.lifetime.lock().await.take() {
            token.cancel();
        }
        self.shared.tx.lock().await.take();
        let count = self.shared.clear_pending().await;
        if count > 0 {
            tracing::debug!("Cleared {} pending requests on close", count);
        }
        self.shared.events.lock().await.take();
        self.shared.last_join.lock().await.take();
    }
}

/// Accept `http(s)://` hub URLs by switching them to `ws(s)://`.
fn websocket_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        _ => return url.to_string(),
    };
    if url.set_scheme(scheme).is_err() {
        return raw.to_string();
    }
    url.to_string()
}

async fn connect(settings: &HubSettings) -> Result<WsStream, SessionError> {
    match tokio::time::timeout(settings.connect_timeout, connect_async(settings.url.as_str())).await
    {
        Err(_) => Err(SessionError::timeout("hub connect", settings.connect_timeout)),
        Ok(Err(e)) => Err(SessionError::connect(format!(
            "Failed to connect to hub at {}: {}",
            settings.url, e
        ))),
        Ok(Ok((stream, _))) => Ok(stream),
    }
}

async fn request(
    shared: &HubShared,
    message: ClientMessage,
    carries_state: bool,
    operation: &'static str,
    timeout: Duration,
) -> Result<ResponseResult, SessionError> {
    // Clone the sender to avoid holding the lock across await
    let Some(tx) = shared.tx.lock().await.clone() else {
        return Err(SessionError::send("hub is not connected"));
    };

    let request_id = message.request_id().to_string();
    let (reply, rx) = oneshot::channel();
    shared.pending.lock().await.insert(
        request_id.clone(),
        Pending {
            reply,
            carries_state,
        },
    );

    if tx.send(message).await.is_err() {
        shared.pending.lock().await.remove(&request_id);
        return Err(SessionError::send("hub connection closed"));
    }

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(_)) => Err(SessionError::send("hub connection lost before reply")),
        Err(_) => {
            shared.pending.lock().await.remove(&request_id);
            Err(SessionError::timeout(operation, timeout))
        }
    }
}

struct ConnectionTasks {
    read: JoinHandle<bool>,
    write: JoinHandle<()>,
}

/// Wire a fresh socket into `shared` and start its read/write tasks.
async fn attach(
    shared: &Arc<HubShared>,
    stream: WsStream,
    token: CancellationToken,
) -> ConnectionTasks {
    let (mut write, mut read) = stream.split();
    let (tx, mut rx) = mpsc::channel::<ClientMessage>(32);
    *shared.tx.lock().await = Some(tx);

    let read_shared = Arc::clone(shared);
    let read = tokio::spawn(async move {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => match parse_server_message(&text) {
                    Ok(ParsedServerMessage::Response { request_id, result }) => {
                        resolve(&read_shared, &request_id, result).await;
                    }
                    Ok(ParsedServerMessage::Other(server_msg)) => {
                        handle_push(&read_shared, *server_msg).await;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse hub message: {}", e);
                    }
                },
                Ok(Message::Close(_)) => {
                    tracing::info!("Hub closed connection");
                    return !token.is_cancelled();
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("Hub WebSocket error: {}", e);
                    return true;
                }
            }
        }
        !token.is_cancelled()
    });

    let write = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!("Failed to serialize hub message: {}", e);
                    continue;
                }
            };
            if let Err(e) = write.send(Message::Text(json)).await {
                tracing::error!("Failed to send hub message: {}", e);
                return;
            }
        }
        let _ = write.close().await;
    });

    ConnectionTasks { read, write }
}

/// Wait for a connection to end. Returns whether it ended unexpectedly.
async fn wait(tasks: ConnectionTasks, token: &CancellationToken) -> bool {
    let ConnectionTasks { read, write } = tasks;
    let read_abort = read.abort_handle();
    let unexpected = tokio::select! {
        biased;
        _ = token.cancelled() => false,
        result = read => result.unwrap_or(true),
        _ = write => {
            tracing::debug!("Hub write task completed");
            !token.is_cancelled()
        }
    };
    read_abort.abort();
    unexpected
}

/// Keep the hub session alive: reconnect with capped backoff and resubscribe.
async fn supervise(
    settings: HubSettings,
    shared: Arc<HubShared>,
    mut tasks: ConnectionTasks,
    token: CancellationToken,
) {
    loop {
        let unexpected = wait(tasks, &token).await;
        shared.tx.lock().await.take();
        shared.clear_pending().await;
        if !unexpected || token.is_cancelled() {
            tracing::debug!("Hub connection closed");
            return;
        }

        tracing::info!("Hub connection closed unexpectedly, initiating reconnection");
        let Some(stream) = reconnect_with_backoff(&settings, &shared, &token).await else {
            return;
        };
        tasks = attach(&shared, stream, token.clone()).await;
        shared.emit(TransportEvent::Reconnected).await;

        let rejoin = shared.last_join.lock().await.clone();
        if let Some((game_id, player_name)) = rejoin {
            let shared = Arc::clone(&shared);
            let timeout = settings.request_timeout;
            tokio::spawn(async move {
                let message = ClientMessage::JoinGame {
                    request_id: Uuid::new_v4().to_string(),
                    game_id: game_id.to_string(),
                    player_name,
                };
                match request(&shared, message, true, "rejoin", timeout).await {
                    Ok(result) if result.is_success() => {
                        tracing::info!(game_id = %game_id, "Resubscribed after reconnect");
                    }
                    Ok(result) => {
                        tracing::warn!(game_id = %game_id, "Rejoin rejected: {:?}", result);
                    }
                    Err(e) => {
                        tracing::warn!(game_id = %game_id, error = %e, "Rejoin failed");
                    }
                }
            });
        }
    }
}

async fn reconnect_with_backoff(
    settings: &HubSettings,
    shared: &HubShared,
    token: &CancellationToken,
) -> Option<WsStream> {
    let mut backoff = BackoffState::new(settings.retry);

    loop {
        let Some(delay) = backoff.next_delay_and_advance() else {
            tracing::error!("Max reconnection attempts reached, giving up");
            shared
                .emit(TransportEvent::Disconnected {
                    reason: format!(
                        "hub unreachable after {} reconnection attempts",
                        backoff.attempts()
                    ),
                })
                .await;
            return None;
        };
        tracing::info!(
            attempt = backoff.attempts(),
            max = backoff.max_attempts(),
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to hub"
        );
        shared
            .emit(TransportEvent::Reconnecting {
                attempt: backoff.attempts(),
                delay,
            })
            .await;

        tokio::select! {
            _ = token.cancelled() => {
                tracing::info!("Reconnection cancelled - transport closed");
                return None;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        match connect(settings).await {
            Ok(stream) if !token.is_cancelled() => return Some(stream),
            Ok(_) => return None,
            Err(e) => {
                tracing::warn!(attempt = backoff.attempts(), error = %e, "Reconnection attempt failed");
            }
        }
    }
}

async fn resolve(shared: &HubShared, request_id: &str, result: ResponseResult) {
    let Some(pending) = shared.pending.lock().await.remove(request_id) else {
        tracing::debug!(request_id, "Response for unknown request");
        return;
    };
    if pending.carries_state {
        publish_reply_state(shared, &result).await;
    }
    let _ = pending.reply.send(result);
}

async fn publish_reply_state(shared: &HubShared, result: &ResponseResult) {
    if !result.is_success() {
        return;
    }
    let state = match result.decode::<MoveResponse>() {
        Ok(reply) => reply.into_state(),
        Err(e) => {
            tracing::warn!("Reply carried no usable state: {}", e);
            None
        }
    };
    let Some(dto) = state else {
        return;
    };
    match dto.to_snapshot() {
        Ok(snapshot) => shared.emit(TransportEvent::Snapshot(snapshot)).await,
        Err(e) => tracing::warn!("Ignoring malformed state in reply: {}", e),
    }
}

async fn handle_push(shared: &HubShared, message: ServerMessage) {
    match message {
        ServerMessage::BoardUpdated { state } | ServerMessage::GameOver { state: Some(state) } => {
            match state.to_snapshot() {
                Ok(snapshot) => shared.emit(TransportEvent::Snapshot(snapshot)).await,
                Err(e) => tracing::warn!("Ignoring malformed pushed state: {}", e),
            }
        }
        ServerMessage::GameOver { state: None } => {
            tracing::debug!("GameOver without state; waiting for the finished board");
        }
        ServerMessage::Error { message } => {
            tracing::warn!("Hub reported error: {}", message);
            shared
                .emit(TransportEvent::AuthorityError { message })
                .await;
        }
        ServerMessage::Response { request_id, .. } => {
            tracing::debug!(request_id, "Unexpected response envelope");
        }
        ServerMessage::Unknown => {
            tracing::debug!("Ignoring unknown hub message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_urls_become_websocket_urls() {
        assert_eq!(
            websocket_url("http://localhost:5197/gamehub"),
            "ws://localhost:5197/gamehub"
        );
        assert_eq!(
            websocket_url("https://games.example.com/gamehub"),
            "wss://games.example.com/gamehub"
        );
        assert_eq!(
            websocket_url("ws://localhost:5197/gamehub"),
            "ws://localhost:5197/gamehub"
        );
    }

    #[tokio::test]
    async fn test_open_against_closed_port_is_a_connect_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = ClientConfig {
            hub_url: format!("ws://127.0.0.1:{}/gamehub", port),
            ..ClientConfig::default()
        };
        let transport = HubTransport::new(&config);
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = transport.open(tx).await.unwrap_err();
        assert!(err.is_unreachable(), "{:?}", err);
    }

    #[tokio::test]
    async fn test_send_before_open_fails_fast() {
        let transport = HubTransport::new(&ClientConfig::default());
        let err = transport
            .send(Command::Create {
                kind: GameKind::Strategy3x3,
            })
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::send("hub is not connected"));
    }
}
