//! Game Rule Engine: pure functions, no I/O.
//!
//! Randomness is injected by the caller so that every rule is reproducible
//! under a seeded generator.

pub mod memory;
pub mod strategy;

pub use memory::{generate_sequence, MemoryProgress, RevealOutcome, FLIP_BACK_DELAY};
pub use strategy::{choose_opponent_move, is_draw, winner_of, WIN_LINES};
