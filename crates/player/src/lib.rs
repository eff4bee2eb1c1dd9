//! PlayTogether player client.
//!
//! Keeps one game session in sync with the remote authority over either a
//! WebSocket hub or HTTP polling, and runs local games against the scripted
//! opponent.

pub mod config;
pub mod error;
pub mod events;
pub mod local;
pub mod ports;
pub mod session;
pub mod transport;

pub use config::{ClientConfig, RetryPolicy, TransportMode};
pub use error::SessionError;
pub use events::{BoardUpdated, ConnectionChanged, EventBus, GameOver};
pub use local::{LocalSession, LocalTurn};
pub use ports::{BoardRenderer, GuestNameGenerator, NameGenerator, Navigator};
pub use session::{
    ConnectionPhase, ConnectionState, ReconciliationSink, SessionManager, SessionPorts,
};
pub use transport::{
    Command, EventSender, HubTransport, PollTransport, Reply, Transport, TransportEvent,
    TransportKind,
};
