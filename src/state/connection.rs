//! Connection registry.
//!
//! Every connected client gets a [`Connection`] record when the transport
//! reports the connect and loses it on disconnect. The record carries the
//! client's display name and location state machine.
//!
//! Accessors hand out owned values only; no map guard escapes this module, so
//! callers can hold a room lock while updating connections without creating a
//! lock cycle.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;

use super::player::{InvalidTransition, PlayerEvent, PlayerState};

/// Connection identity assigned by the transport.
pub type ClientId = String;

/// Name used until the client sets one.
pub const DEFAULT_DISPLAY_NAME: &str = "Commander";

/// Errors updating a connection's location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("client {0} is not connected")]
    Unknown(ClientId),
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

/// A connected client.
#[derive(Debug, Clone)]
pub struct Connection {
    pub client_id: ClientId,

    pub display_name: String,

    /// Where the client is (lobby, session, match)
    pub state: PlayerState,

    pub connected_at: DateTime<Utc>,

    /// Last command received
    pub last_activity: DateTime<Utc>,
}

impl Connection {
    /// Create a connected record.
    pub fn new(client_id: ClientId, display_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            client_id,
            display_name: display_name.unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
            state: PlayerState::connected(),
            connected_at: now,
            last_activity: now,
        }
    }

    /// Record activity.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// Connection manager - tracks all connected clients.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    connections: DashMap<ClientId, Connection>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection, replacing any stale record with the same id.
    pub fn add(&self, conn: Connection) {
        self.connections.insert(conn.client_id.clone(), conn);
    }

    /// Snapshot of a connection.
    pub fn get(&self, client_id: &str) -> Option<Connection> {
        self.connections.get(client_id).map(|c| c.value().clone())
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.connections.contains_key(client_id)
    }

    /// Remove a connection.
    pub fn remove(&self, client_id: &str) -> Option<Connection> {
        self.connections.remove(client_id).map(|(_, c)| c)
    }

    pub fn display_name(&self, client_id: &str) -> Option<String> {
        self.connections
            .get(client_id)
            .map(|c| c.display_name.clone())
    }

    /// Returns false if the client is unknown.
    pub fn set_display_name(&self, client_id: &str, name: String) -> bool {
        match self.connections.get_mut(client_id) {
            Some(mut conn) => {
                conn.display_name = name;
                true
            }
            None => false,
        }
    }

    /// Session the client belongs to, if any.
    pub fn session_of(&self, client_id: &str) -> Option<String> {
        self.connections
            .get(client_id)
            .and_then(|c| c.state.session_id().map(str::to_string))
    }

    /// Apply a location event to one client.
    ///
    /// The check and the update happen under the entry's lock, so of two
    /// racing `JoinSession` events at most one succeeds.
    pub fn apply_event(&self, client_id: &str, event: PlayerEvent) -> Result<(), ConnectionError> {
        let mut conn = self
            .connections
            .get_mut(client_id)
            .ok_or_else(|| ConnectionError::Unknown(client_id.to_string()))?;
        conn.state.apply_mut(event)?;
        Ok(())
    }

    /// Apply the same event to several clients, logging rejected transitions.
    pub fn apply_event_all<'a, I>(&self, client_ids: I, event: PlayerEvent)
    where
        I: IntoIterator<Item = &'a ClientId>,
    {
        for id in client_ids {
            if let Err(e) = self.apply_event(id, event.clone()) {
                tracing::debug!(client = %id, error = %e, "location transition skipped");
            }
        }
    }

    pub fn touch(&self, client_id: &str) {
        if let Some(mut conn) = self.connections.get_mut(client_id) {
            conn.touch();
        }
    }

    /// Count connected clients.
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// All client ids.
    pub fn client_ids(&self) -> Vec<ClientId> {
        self.connections.iter().map(|c| c.key().clone()).collect()
    }
}
