//! Transport abstraction: how commands reach the authority and snapshots come back.
//!
//! Two implementations share one contract:
//! - [`HubTransport`]: persistent WebSocket, the authority pushes state
//! - [`PollTransport`]: HTTP requests plus a fixed-interval state poll
//!
//! Every snapshot, including the ones carried in command replies, is
//! delivered through the event channel handed to [`Transport::open`], so the
//! consumer sees a single ordered stream.

mod backoff;
pub mod hub;
pub mod poll;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use playtogether_domain::{GameKind, ParticipantId, RemoteGameId, Snapshot, Symbol};

use crate::config::{ClientConfig, TransportMode};
use crate::error::SessionError;

pub use backoff::BackoffState;
pub use hub::HubTransport;
pub use poll::PollTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Hub,
    Poll,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Hub => f.write_str("hub"),
            TransportKind::Poll => f.write_str("poll"),
        }
    }
}

/// One command for the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create {
        kind: GameKind,
    },
    Join {
        game_id: RemoteGameId,
        participant_name: String,
    },
    Move {
        game_id: RemoteGameId,
        participant_id: ParticipantId,
        position: usize,
        /// Selects `move` vs `flip` routing
        kind: GameKind,
    },
    Leave {
        game_id: RemoteGameId,
        participant_id: ParticipantId,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Create { .. } => "create",
            Command::Join { .. } => "join",
            Command::Move { .. } => "move",
            Command::Leave { .. } => "leave",
        }
    }
}

/// Acknowledgement of a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Created {
        game_id: RemoteGameId,
        kind: GameKind,
    },
    /// The joined state itself arrives on the event stream.
    Joined {
        participant_id: Option<ParticipantId>,
        mark: Option<Symbol>,
        kind: Option<GameKind>,
    },
    Accepted,
}

/// What a transport reports asynchronously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Snapshot(Snapshot),
    /// Delivery lost; automatic recovery attempt `attempt` is scheduled after `delay`.
    Reconnecting { attempt: u32, delay: Duration },
    Reconnected,
    /// Terminal: recovery gave up or the authority closed the session.
    Disconnected { reason: String },
    /// Error pushed by the authority that is not tied to a command
    AuthorityError { message: String },
}

pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Establish delivery. Events for this session go to `events` until `close`.
    async fn open(&self, events: EventSender) -> Result<(), SessionError>;

    async fn send(&self, command: Command) -> Result<Reply, SessionError>;

    /// Release the connection. Idempotent.
    async fn close(&self);
}

/// Transports to try, in order, for the configured mode.
pub fn transports_for(config: &ClientConfig) -> Vec<Arc<dyn Transport>> {
    let hub = || -> Arc<dyn Transport> { Arc::new(HubTransport::new(config)) };
    let poll = || -> Arc<dyn Transport> { Arc::new(PollTransport::new(config)) };
    match config.transport {
        TransportMode::Hub => vec![hub()],
        TransportMode::Poll => vec![poll()],
        TransportMode::Auto => vec![hub(), poll()],
    }
}
