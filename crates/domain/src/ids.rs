use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifiers minted by the Remote Authority are opaque strings.
macro_rules! define_remote_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

/// Identity of one locally created session, minted on each successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Remote authority identities
define_remote_id!(RemoteGameId);
define_remote_id!(ParticipantId);

impl ParticipantId {
    /// Seat that moves first in a local game.
    pub fn player_one() -> Self {
        Self::new("player1")
    }

    /// Seat played by the scripted opponent in a local game.
    pub fn player_two() -> Self {
        Self::new("player2")
    }
}
