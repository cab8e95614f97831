//! Wire messages.
//!
//! Commands arrive as `{"command": "...", "payload": {...}}` and events leave
//! as `{"event": "...", "data": {...}}`. The transport owns the socket; this
//! module only defines the shapes and who each event is for.

use serde::{Deserialize, Serialize};

use super::chat::ChatMessage;
use super::connection::ClientId;
use super::game::Notification;
use super::room::SessionId;
use super::turn::GameResult;

/// A command from a client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", content = "payload", rename_all = "kebab-case")]
pub enum ClientCommand {
    CreateSession {
        #[serde(default)]
        name: String,
        #[serde(default)]
        capacity: Option<usize>,
    },
    JoinSession {
        #[serde(alias = "sessionId")]
        session_id: SessionId,
    },
    LeaveSession,
    LeaveGame,
    StartGame,
    /// Raw action payload; parsed by the game engine so a bad action is
    /// dropped instead of rejected as a bad command.
    GameAction(serde_json::Value),
    SetDisplayName {
        name: String,
    },
    SendChat {
        text: String,
    },
    ListSessions,
}

impl ClientCommand {
    /// Parse a command from its JSON text.
    pub fn parse(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateSession { .. } => "create-session",
            Self::JoinSession { .. } => "join-session",
            Self::LeaveSession => "leave-session",
            Self::LeaveGame => "leave-game",
            Self::StartGame => "start-game",
            Self::GameAction(_) => "game-action",
            Self::SetDisplayName { .. } => "set-display-name",
            Self::SendChat { .. } => "send-chat",
            Self::ListSessions => "list-sessions",
        }
    }
}

/// An event for one or more clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Summaries of every live session
    SessionList(Vec<serde_json::Value>),
    /// Lobby view, sent to the creator
    SessionCreated(serde_json::Value),
    /// Lobby view, sent to the joiner
    SessionJoined(serde_json::Value),
    /// Lobby view, sent to the other members
    SessionUpdated(serde_json::Value),
    SessionLeft { session_id: SessionId },
    /// Full game snapshot
    GameStarted(serde_json::Value),
    /// Full game snapshot
    GameStateUpdate(serde_json::Value),
    GameFinished(GameResult),
    PlayerLeftGame {
        player_index: usize,
        player_name: String,
    },
    ActionError { reason: &'static str },
    Notification(Notification),
    Chat(ChatMessage),
    DisplayNameSet { name: String },
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionList(_) => "session-list",
            Self::SessionCreated(_) => "session-created",
            Self::SessionJoined(_) => "session-joined",
            Self::SessionUpdated(_) => "session-updated",
            Self::SessionLeft { .. } => "session-left",
            Self::GameStarted(_) => "game-started",
            Self::GameStateUpdate(_) => "game-state-update",
            Self::GameFinished(_) => "game-finished",
            Self::PlayerLeftGame { .. } => "player-left-game",
            Self::ActionError { .. } => "action-error",
            Self::Notification(_) => "notification",
            Self::Chat(_) => "chat",
            Self::DisplayNameSet { .. } => "display-name-set",
        }
    }

    pub fn error(reason: &'static str) -> Self {
        Self::ActionError { reason }
    }

    /// Encode for the wire.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Who should receive an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Client(ClientId),
    Clients(Vec<ClientId>),
    Everyone,
}

impl Recipient {
    pub fn includes(&self, client_id: &str) -> bool {
        match self {
            Self::Client(id) => id == client_id,
            Self::Clients(ids) => ids.iter().any(|id| id == client_id),
            Self::Everyone => true,
        }
    }
}

/// An addressed event, handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub recipient: Recipient,
    pub event: ServerEvent,
}

impl Outbound {
    pub fn to_client(client_id: impl Into<ClientId>, event: ServerEvent) -> Self {
        Self {
            recipient: Recipient::Client(client_id.into()),
            event,
        }
    }

    pub fn to_clients(client_ids: Vec<ClientId>, event: ServerEvent) -> Self {
        Self {
            recipient: Recipient::Clients(client_ids),
            event,
        }
    }

    pub fn broadcast(event: ServerEvent) -> Self {
        Self {
            recipient: Recipient::Everyone,
            event,
        }
    }
}
