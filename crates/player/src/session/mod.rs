//! Remote session lifecycle: the manager that drives a transport and the
//! sink that reconciles authoritative snapshots into the local game session.

mod manager;
mod sink;

use std::fmt;

use chrono::{DateTime, Utc};

use playtogether_domain::{GameKind, ParticipantId, RemoteGameId, SessionId};

use crate::transport::TransportKind;

pub use manager::{SessionManager, SessionPorts};
pub use sink::ReconciliationSink;

/// `Disconnected -> Connecting -> Connected <-> Reconnecting`, and back to
/// `Disconnected` on leave or when retries run out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionPhase::Disconnected => "disconnected",
            ConnectionPhase::Connecting => "connecting",
            ConnectionPhase::Connected => "connected",
            ConnectionPhase::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}

/// Connection bookkeeping owned by the [`SessionManager`].
///
/// Handed out as a copy by [`SessionManager::diagnostics`]. It is a
/// debugging side-channel and nothing should branch on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub phase: ConnectionPhase,
    /// Local id of the current connected session
    pub session_id: Option<SessionId>,
    pub participant_name: Option<String>,
    pub remote_game_id: Option<RemoteGameId>,
    pub participant_id: Option<ParticipantId>,
    pub game_kind: Option<GameKind>,
    pub transport: Option<TransportKind>,
    /// Create/join attempts made by the latest `create_or_join`
    pub attempt_count: u32,
    /// Current automatic recovery attempt, 0 while healthy
    pub reconnect_attempt: u32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}
