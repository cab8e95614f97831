//! State management for conquest sessions.
//!
//! This module provides the core state types and managers:
//!
//! - `territory` - Static map: 42 territories, adjacency, regions
//! - `combat` - Dice battles and battle reward draws
//! - `game` - Per-session match state and action handling
//! - `turn` - Turn passing, departures, end conditions
//! - `room` - Session lobbies and the session registry
//! - `player` - Player location state machine (where is each client?)
//! - `connection` - Connected client tracking
//! - `chat` - Bounded per-session chat log
//! - `protocol` - Inbound commands and outbound events
//! - `config` - Server tunables
//! - `server` - Command handling over all of the above
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                              Server                                  │
//! │                                                                      │
//! │  ┌───────────────────┐          ┌──────────────────────────────┐     │
//! │  │ ConnectionManager │          │         RoomManager          │     │
//! │  │                   │          │                              │     │
//! │  │ client_id →       │          │ session_id →                 │     │
//! │  │   Connection      │          │   Arc<Mutex<Room>>           │     │
//! │  │   (PlayerState)   │          │                              │     │
//! │  └───────────────────┘          │  Room: members, chat,        │     │
//! │                                 │        Option<GameState>     │     │
//! │                                 └──────────────┬───────────────┘     │
//! │                                                │                     │
//! │                        ┌───────────────────────┼──────────────┐      │
//! │                        ▼                       ▼              ▼      │
//! │                     combat                   turn         territory  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use conquest_state::state::{ClientCommand, Server, ServerEvent};
//!
//! let server = Server::default();
//! server.connect("alice".to_string(), Some("Alice".to_string()));
//!
//! let out = server.handle(
//!     "alice",
//!     ClientCommand::CreateSession {
//!         name: "Friday night".to_string(),
//!         capacity: Some(4),
//!     },
//! );
//! assert!(matches!(out[0].event, ServerEvent::SessionCreated(_)));
//! ```

pub mod chat;
pub mod combat;
pub mod config;
pub mod connection;
pub mod game;
pub mod player;
pub mod protocol;
pub mod room;
pub mod server;
pub mod territory;
pub mod turn;

// Re-export commonly used types
pub use chat::{ChatLog, ChatMessage};
pub use combat::{resolve_battle, BattleOutcome, DiceRoller};
pub use config::{ConfigError, ServerConfig};
pub use connection::{ClientId, Connection, ConnectionError, ConnectionManager};
pub use game::{
    ActionOutcome, ActionRejection, GameAction, GamePlayer, GameState, Notification,
    NotificationDetail, Phase, Territory, MAX_PLAYERS,
};
pub use player::{InvalidTransition, PlayerEvent, PlayerLocation, PlayerState};
pub use protocol::{ClientCommand, Outbound, Recipient, ServerEvent};
pub use room::{LobbyMember, Room, RoomError, RoomManager, RoomStatus, SessionId};
pub use server::Server;
pub use territory::{RegionDef, TerritoryDef, TerritoryId, REGIONS, TERRITORIES, TERRITORY_COUNT};
pub use turn::{Departure, FinishReason, GameResult};
