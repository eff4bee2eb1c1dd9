//! PlayTogether Protocol - Shared types for the client and the game authority
//!
//! This crate contains everything exchanged with the Remote Authority:
//! - Lenient wire DTOs for game state (REST + hub)
//! - REST request/response bodies
//! - Hub message envelopes (ClientMessage, ServerMessage)
//!
//! # Design Principles
//!
//! 1. **No business logic** - Pure data types, serialization, and conversion into domain values
//! 2. **Lenient in, strict out** - DTOs accept camelCase and PascalCase fields, domain values are validated

pub mod dto;
pub mod error;
pub mod messages;
pub mod requests;
pub mod responses;

pub use dto::{CellDto, CellValueDto, GameStateDto, PlayerDto};
pub use error::ProtocolError;
pub use messages::{parse_server_message, ClientMessage, ParsedServerMessage, ServerMessage};
pub use requests::{CreateGameRequest, JoinGameRequest, LeaveRequest, MoveRequest};
pub use responses::{
    CreateGameResponse, ErrorCode, JoinGameResponse, MoveResponse, ResponseResult,
};
