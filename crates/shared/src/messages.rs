//! Hub message envelopes.
//!
//! Every client invocation carries a `request_id`; the authority answers
//! with a [`ServerMessage::Response`] echoing it. State pushes arrive as
//! separate messages at any time after a successful `JoinGame`.

use serde::{Deserialize, Serialize};

use crate::dto::GameStateDto;
use crate::responses::ResponseResult;

/// Messages from the client to the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    CreateGame {
        request_id: String,
        game_type: String,
    },
    JoinGame {
        request_id: String,
        game_id: String,
        player_name: String,
    },
    /// Strategy move
    MakeMove {
        request_id: String,
        game_id: String,
        player_id: String,
        position: usize,
    },
    /// Memory reveal
    FlipCard {
        request_id: String,
        game_id: String,
        player_id: String,
        position: usize,
    },
    LeaveGame {
        request_id: String,
        game_id: String,
        player_id: String,
    },
}

impl ClientMessage {
    pub fn request_id(&self) -> &str {
        match self {
            ClientMessage::CreateGame { request_id, .. }
            | ClientMessage::JoinGame { request_id, .. }
            | ClientMessage::MakeMove { request_id, .. }
            | ClientMessage::FlipCard { request_id, .. }
            | ClientMessage::LeaveGame { request_id, .. } => request_id,
        }
    }
}

/// Messages from the authority to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    Response {
        request_id: String,
        result: ResponseResult,
    },
    BoardUpdated {
        state: GameStateDto,
    },
    /// Sent once the game ends. Older authorities send no state.
    GameOver {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<GameStateDto>,
    },
    Error {
        message: String,
    },
    #[serde(other)]
    Unknown,
}

/// Parsed server message with `Response` lifted out for easier handling.
#[derive(Debug)]
pub enum ParsedServerMessage {
    Response {
        request_id: String,
        result: ResponseResult,
    },
    Other(Box<ServerMessage>),
}

pub fn parse_server_message(text: &str) -> Result<ParsedServerMessage, serde_json::Error> {
    let msg: ServerMessage = serde_json::from_str(text)?;
    Ok(match msg {
        ServerMessage::Response { request_id, result } => {
            ParsedServerMessage::Response { request_id, result }
        }
        other => ParsedServerMessage::Other(Box::new(other)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responses::ErrorCode;

    #[test]
    fn test_client_message_is_tagged_by_type() {
        let msg = ClientMessage::FlipCard {
            request_id: "r1".to_string(),
            game_id: "g1".to_string(),
            player_id: "p1".to_string(),
            position: 3,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "FlipCard");
        assert_eq!(json["position"], 3);
        assert_eq!(msg.request_id(), "r1");
    }

    #[test]
    fn test_response_is_lifted_out() {
        let text = r#"{"type": "Response", "request_id": "r9",
                       "result": {"status": "error", "code": "not_found", "message": "no game"}}"#;
        match parse_server_message(text).unwrap() {
            ParsedServerMessage::Response { request_id, result } => {
                assert_eq!(request_id, "r9");
                assert_eq!(result, ResponseResult::error(ErrorCode::NotFound, "no game"));
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_push_messages_pass_through() {
        let text = r#"{"type": "GameOver"}"#;
        match parse_server_message(text).unwrap() {
            ParsedServerMessage::Other(msg) => {
                assert_eq!(*msg, ServerMessage::GameOver { state: None })
            }
            other => panic!("expected push, got {:?}", other),
        }

        let text = r#"{"type": "SomethingNew", "x": 1}"#;
        assert!(matches!(
            parse_server_message(text).unwrap(),
            ParsedServerMessage::Other(msg) if *msg == ServerMessage::Unknown
        ));
    }
}
