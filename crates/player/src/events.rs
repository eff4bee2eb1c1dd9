//! Event bus for session notifications.
//!
//! Push-based: subscribers register callbacks that are invoked, in
//! registration order, for every dispatched event. The bus holds strong
//! references to subscribers until it is cleared or dropped.

use std::sync::Arc;

use tokio::sync::Mutex;

use playtogether_domain::{Board, GameOutcome, GameStatus, RemoteGameId, Snapshot};

use crate::session::ConnectionPhase;

/// Raised once when a session enters `Finished`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOver {
    pub game_id: Option<RemoteGameId>,
    pub snapshot: Snapshot,
    /// From this participant's seat
    pub outcome: GameOutcome,
}

/// Connection phase change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionChanged {
    pub phase: ConnectionPhase,
    pub error: Option<String>,
}

/// Board change after a snapshot or a local move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardUpdated {
    pub board: Board,
    pub status: GameStatus,
}

type Subscriber<E> = Box<dyn FnMut(E) + Send + 'static>;

pub struct EventBus<E> {
    subscribers: Arc<Mutex<Vec<Subscriber<E>>>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<E: Clone + Send + 'static> EventBus<E> {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn subscribe(&self, callback: impl FnMut(E) + Send + 'static) {
        self.subscribers.lock().await.push(Box::new(callback));
    }

    /// Dispatch an event to all subscribers.
    ///
    /// Each subscriber's callback is invoked with a clone of the event.
    pub async fn dispatch(&self, event: E) {
        let mut subscribers = self.subscribers.lock().await;
        for subscriber in subscribers.iter_mut() {
            subscriber(event.clone());
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    pub async fn clear(&self) {
        self.subscribers.lock().await.clear();
    }
}

impl<E: Clone + Send + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
