//! Conquest State Library
//!
//! This crate provides the authoritative server-side state for a turn-based
//! territorial conquest game for two to six players.
//!
//! # Overview
//!
//! The state module provides:
//!
//! - **Session Registry** - Rooms with ordered membership, host hand-off, and
//!   deletion once the last member leaves.
//!
//! - **Game State Engine** - Dealing the board, the reinforce / attack /
//!   fortify phase machine, and validated actions.
//!
//! - **Combat** - Iterative dice battles and battle reward draws.
//!
//! - **Turns and Departures** - Skipping inactive players, redistributing a
//!   departed player's territories, and end conditions.
//!
//! - **Player State Machine** - Tracks where each client is (connected, in a
//!   session, playing) with validated transitions.
//!
//! # Design Principles
//!
//! 1. **One lock per room** - Every operation on a room runs under that room's
//!    mutex; rooms never share mutable state.
//!
//! 2. **No networking** - This crate is pure state. The transport feeds
//!    commands in and delivers the returned [`state::Outbound`] events.
//!
//! 3. **Bad input is never fatal** - Malformed or illegal commands are either
//!    reported with a short reason or dropped.
//!
//! 4. **Serialization-ready** - Rooms and games convert to JSON for clients.
//!
//! # Example
//!
//! ```rust
//! use conquest_state::state::{ClientCommand, Server, ServerEvent};
//!
//! let server = Server::default();
//! server.connect("a".to_string(), Some("Alice".to_string()));
//! server.connect("b".to_string(), Some("Bob".to_string()));
//!
//! let out = server.handle_json(
//!     "a",
//!     r#"{"command": "create-session", "payload": {"name": "Friday"}}"#,
//! );
//! let session_id = match &out[0].event {
//!     ServerEvent::SessionCreated(lobby) => lobby["session_id"].as_str().unwrap().to_string(),
//!     _ => unreachable!(),
//! };
//!
//! server.handle("b", ClientCommand::JoinSession { session_id });
//! let out = server.handle("a", ClientCommand::StartGame);
//! assert!(matches!(out[0].event, ServerEvent::GameStarted(_)));
//! ```

pub mod state;

// Re-export everything from state module at crate root
pub use state::*;
