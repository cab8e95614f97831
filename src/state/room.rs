//! Room (session) state management.
//!
//! A room is a lobby that turns into a match when its host starts the game.
//! Membership is kept in join order; the earliest remaining member inherits the
//! host role. A room is deleted as soon as its last member leaves, whatever
//! the match status.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use super::chat::{ChatLog, ChatMessage};
use super::connection::ClientId;
use super::game::{ActionOutcome, ActionRejection, GameAction, GameSetupError, GameState};
use super::turn::{Departure, GameResult};

/// Session identifier: a short uppercase hex code.
pub type SessionId = String;

/// Room lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Lobby open, no match yet
    #[default]
    Waiting,
    /// Match running
    Playing,
    /// Match over; members may still chat
    Finished,
}

impl RoomStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Playing => "playing",
            Self::Finished => "finished",
        }
    }
}

/// A member of a room's lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyMember {
    pub client_id: ClientId,

    pub display_name: String,

    pub joined_at: DateTime<Utc>,
}

impl LobbyMember {
    /// Create a member joining now.
    pub fn new(client_id: ClientId, display_name: String) -> Self {
        Self {
            client_id,
            display_name,
            joined_at: Utc::now(),
        }
    }
}

/// Room errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("session not found")]
    NotFound,
    #[error("session is not accepting players")]
    NotWaiting,
    #[error("session is full")]
    Full,
    #[error("already a member of this session")]
    AlreadyMember,
    #[error("not a member of this session")]
    NotMember,
    #[error("only the host can do that")]
    NotHost,
    #[error("need at least {needed} players to start")]
    NotEnoughPlayers { needed: usize },
    #[error(transparent)]
    Setup(#[from] GameSetupError),
}

impl RoomError {
    /// Short machine-readable reason.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotFound => "session-not-found",
            Self::NotWaiting => "session-not-waiting",
            Self::Full => "session-full",
            Self::AlreadyMember => "already-member",
            Self::NotMember => "not-member",
            Self::NotHost => "not-host",
            Self::NotEnoughPlayers { .. } => "not-enough-players",
            Self::Setup(_) => "invalid-setup",
        }
    }
}

/// A session: lobby membership plus an optional running match.
#[derive(Debug)]
pub struct Room {
    pub id: SessionId,

    pub name: String,

    pub host_id: ClientId,

    /// Members in join order
    members: Vec<LobbyMember>,

    pub capacity: usize,

    pub status: RoomStatus,

    pub game: Option<GameState>,

    /// Result once the match has ended
    pub result: Option<GameResult>,

    chat: ChatLog,

    pub created_at: DateTime<Utc>,

    /// Set once the room has been dropped from the registry
    closed: bool,
}

impl Room {
    /// Create a waiting room with the host as its only member.
    pub fn new(id: SessionId, name: String, host: LobbyMember, capacity: usize) -> Self {
        Self {
            id,
            name,
            host_id: host.client_id.clone(),
            members: vec![host],
            capacity,
            status: RoomStatus::Waiting,
            game: None,
            result: None,
            chat: ChatLog::default(),
            created_at: Utc::now(),
            closed: false,
        }
    }

    /// Replace the chat log with one of the given size.
    pub fn with_chat_limit(mut self, limit: usize) -> Self {
        self.chat = ChatLog::with_limit(limit);
        self
    }

    /// Add a member.
    pub fn join(&mut self, member: LobbyMember) -> Result<(), RoomError> {
        if self.closed {
            return Err(RoomError::NotFound);
        }
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::NotWaiting);
        }
        if self.is_full() {
            return Err(RoomError::Full);
        }
        if self.has_member(&member.client_id) {
            return Err(RoomError::AlreadyMember);
        }
        self.members.push(member);
        Ok(())
    }

    /// Remove a member, handing the host role to the earliest remaining member.
    pub fn leave(&mut self, client_id: &str) -> Option<LobbyMember> {
        let pos = self.members.iter().position(|m| m.client_id == client_id)?;
        let member = self.members.remove(pos);

        if self.host_id == client_id {
            if let Some(next) = self.members.first() {
                self.host_id = next.client_id.clone();
            }
        }

        Some(member)
    }

    /// Get a member by client id.
    pub fn get_member(&self, client_id: &str) -> Option<&LobbyMember> {
        self.members.iter().find(|m| m.client_id == client_id)
    }

    /// Check if a client is a member.
    pub fn has_member(&self, client_id: &str) -> bool {
        self.get_member(client_id).is_some()
    }

    /// Check if a client is the host.
    pub fn is_host(&self, client_id: &str) -> bool {
        self.host_id == client_id
    }

    /// Update a member's display name. Returns false for non-members.
    pub fn rename_member(&mut self, client_id: &str, name: &str) -> bool {
        match self.members.iter_mut().find(|m| m.client_id == client_id) {
            Some(member) => {
                member.display_name = name.to_string();
                true
            }
            None => false,
        }
    }

    /// Members in join order.
    pub fn members(&self) -> impl Iterator<Item = &LobbyMember> {
        self.members.iter()
    }

    /// Member client ids in join order.
    pub fn member_ids(&self) -> Vec<ClientId> {
        self.members.iter().map(|m| m.client_id.clone()).collect()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
    }

    /// Display name of the host.
    pub fn host_name(&self) -> Option<&str> {
        self.get_member(&self.host_id)
            .map(|m| m.display_name.as_str())
    }

    /// Start the match from the current membership.
    pub fn start<R: Rng + ?Sized>(
        &mut self,
        client_id: &str,
        min_players: usize,
        rng: &mut R,
    ) -> Result<&GameState, RoomError> {
        if !self.is_host(client_id) {
            return Err(RoomError::NotHost);
        }
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::NotWaiting);
        }
        if self.members.len() < min_players {
            return Err(RoomError::NotEnoughPlayers {
                needed: min_players,
            });
        }

        let seats: Vec<(ClientId, String)> = self
            .members
            .iter()
            .map(|m| (m.client_id.clone(), m.display_name.clone()))
            .collect();
        let game = GameState::new(&seats, rng)?;

        self.status = RoomStatus::Playing;
        self.result = None;
        tracing::info!(session = %self.id, players = seats.len(), "game started");
        Ok(self.game.insert(game))
    }

    /// Apply a game action, finishing the room if the action ended the match.
    pub fn apply_action<R: Rng + ?Sized>(
        &mut self,
        client_id: &str,
        action: &GameAction,
        rng: &mut R,
    ) -> Result<ActionOutcome, ActionRejection> {
        if self.status != RoomStatus::Playing {
            return Err(ActionRejection::GameNotActive);
        }
        let game = self.game.as_mut().ok_or(ActionRejection::GameNotActive)?;
        let outcome = game.apply_action(client_id, action, rng)?;
        if let Some(result) = &outcome.result {
            self.finish(result.clone());
        }
        Ok(outcome)
    }

    /// Take a member out of the running match by identity.
    pub fn remove_from_game<R: Rng + ?Sized>(
        &mut self,
        client_id: &str,
        rng: &mut R,
    ) -> Option<Departure> {
        if self.status != RoomStatus::Playing {
            return None;
        }
        let game = self.game.as_mut()?;
        if !game.player(game.player_index(client_id)?)?.active {
            return None;
        }
        game.remove_player(client_id, rng)
    }

    /// Finish the room if one or zero players remain active.
    pub fn check_end_condition(&mut self) -> Option<GameResult> {
        if self.status != RoomStatus::Playing {
            return None;
        }
        let result = self.game.as_ref()?.end_condition()?;
        self.finish(result.clone());
        Some(result)
    }

    fn finish(&mut self, result: GameResult) {
        tracing::info!(
            session = %self.id,
            winner = ?result.winner_name,
            reason = ?result.reason,
            "game finished"
        );
        self.status = RoomStatus::Finished;
        self.result = Some(result);
    }

    /// Append a chat message.
    pub fn post_chat(&mut self, message: ChatMessage) {
        self.chat.push(message);
    }

    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    /// Lobby view for clients; leaves out the game state.
    pub fn to_json(&self) -> serde_json::Value {
        let members: Vec<serde_json::Value> = self
            .members
            .iter()
            .map(|m| {
                serde_json::json!({
                    "id": m.client_id,
                    "name": m.display_name,
                    "is_host": m.client_id == self.host_id
                })
            })
            .collect();

        serde_json::json!({
            "session_id": self.id,
            "name": self.name,
            "host_id": self.host_id,
            "members": members,
            "capacity": self.capacity,
            "status": self.status.as_str(),
            "chat": self.chat.messages().collect::<Vec<_>>()
        })
    }

    /// Entry for the session list.
    pub fn summary_json(&self) -> serde_json::Value {
        serde_json::json!({
            "session_id": self.id,
            "name": self.name,
            "host_name": self.host_name(),
            "player_count": self.members.len(),
            "capacity": self.capacity,
            "status": self.status.as_str()
        })
    }
}

/// Shared handle to one room. All access goes through its mutex.
pub type RoomHandle = Arc<Mutex<Room>>;

/// Lock a room, recovering from a panic in a previous holder.
pub fn lock_room(handle: &RoomHandle) -> MutexGuard<'_, Room> {
    handle.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("recovering poisoned room lock");
        poisoned.into_inner()
    })
}

/// Room manager - tracks all live rooms.
///
/// Guards from the underlying maps are never held while a room is locked by
/// the caller of a lookup: lookups clone the handle out and release the map.
/// The session list is served from a summary cache that each room refreshes
/// under its own lock, so listing sessions never waits on a room.
#[derive(Debug, Default)]
pub struct RoomManager {
    rooms: DashMap<SessionId, RoomHandle>,

    /// Latest summary per room, keyed like `rooms`
    summaries: DashMap<SessionId, (DateTime<Utc>, serde_json::Value)>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a room under a fresh session id.
    pub fn create<R: Rng + ?Sized>(
        &self,
        name: String,
        host: LobbyMember,
        capacity: usize,
        chat_limit: usize,
        rng: &mut R,
    ) -> (SessionId, RoomHandle) {
        loop {
            let id = format!("{:06X}", rng.gen_range(0..0x100_0000u32));
            if let Entry::Vacant(slot) = self.rooms.entry(id.clone()) {
                let room = Room::new(id.clone(), name, host, capacity).with_chat_limit(chat_limit);
                self.summaries
                    .insert(id.clone(), (room.created_at, room.summary_json()));
                let handle = Arc::new(Mutex::new(room));
                slot.insert(Arc::clone(&handle));
                tracing::info!(session = %id, "session created");
                return (id, handle);
            }
        }
    }

    /// Get a room handle by id.
    pub fn get(&self, session_id: &str) -> Option<RoomHandle> {
        self.rooms.get(session_id).map(|r| Arc::clone(r.value()))
    }

    /// Refresh a room's entry in the session list. Call while holding its lock.
    pub fn publish(&self, room: &Room) {
        if room.is_closed() {
            return;
        }
        self.summaries
            .insert(room.id.clone(), (room.created_at, room.summary_json()));
    }

    /// Drop a room from the registry. Call while holding its lock so no other
    /// operation observes it half-removed.
    pub fn remove(&self, room: &mut Room) {
        room.close();
        self.rooms.remove(&room.id);
        self.summaries.remove(&room.id);
        tracing::info!(session = %room.id, "session deleted");
    }

    /// Count live rooms.
    pub fn count(&self) -> usize {
        self.rooms.len()
    }

    /// Session list snapshot, oldest room first.
    pub fn summaries(&self) -> Vec<serde_json::Value> {
        let mut list: Vec<(DateTime<Utc>, serde_json::Value)> = self
            .summaries
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        list.sort_by_key(|(created, _)| *created);
        list.into_iter().map(|(_, v)| v).collect()
    }
}
