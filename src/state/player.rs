//! Player location state machine.
//!
//! Tracks where a connected client is and validates transitions. The server
//! consults it before touching any room so that, for example, a client that is
//! already seated somewhere cannot open a second session.
//!
//! # State Diagram
//!
//! ```text
//! ┌──────────────┐
//! │ Disconnected │◀─────────────────────────────────┐
//! └──────┬───────┘                                  │
//!        │ connect                                  │ disconnect
//!        ▼                                          │
//! ┌──────────────┐  join_session  ┌─────────────┐   │
//! │  Connected   │───────────────▶│  InSession  │───┤
//! │              │◀───────────────│  (waiting)  │   │
//! └──────────────┘  leave_session └──────┬──────┘   │
//!        ▲                          ▲    │          │
//!        │                          │    │ start    │
//!        │                leave_game│    ▼          │
//!        │                game_over │ ┌─────────┐   │
//!        │                          └─│ Playing │───┘
//!        └────────────────────────────└─────────┘
//!                    leave_session
//! ```

use std::fmt;

use thiserror::Error;

use super::room::SessionId;

/// Where a client currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlayerLocation {
    /// No live connection
    #[default]
    Disconnected,

    /// Connected, not in any session
    Connected,

    /// Member of a session that has no match running for them
    InSession { session_id: SessionId },

    /// Seated in a running match
    Playing { session_id: SessionId },
}

impl PlayerLocation {
    pub fn is_connected(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    /// Check if the client belongs to a session (playing or not).
    pub fn is_in_session(&self) -> bool {
        matches!(self, Self::InSession { .. } | Self::Playing { .. })
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing { .. })
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::InSession { session_id } | Self::Playing { session_id } => Some(session_id),
            _ => None,
        }
    }
}

impl fmt::Display for PlayerLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connected => write!(f, "Connected"),
            Self::InSession { session_id } => write!(f, "InSession({})", session_id),
            Self::Playing { session_id } => write!(f, "Playing({})", session_id),
        }
    }
}

/// State transition events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    Connect,
    Disconnect,
    JoinSession { session_id: SessionId },
    LeaveSession,
    StartGame,
    LeaveGame,
    GameOver,
}

/// Error when a state transition is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition from {from} via {event:?}: {reason}")]
pub struct InvalidTransition {
    pub from: PlayerLocation,
    pub event: PlayerEvent,
    pub reason: &'static str,
}

/// Player location state machine.
#[derive(Debug, Clone, Default)]
pub struct PlayerState {
    location: PlayerLocation,
}

impl PlayerState {
    /// Create a new disconnected player state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state for a client that has just connected.
    pub fn connected() -> Self {
        Self {
            location: PlayerLocation::Connected,
        }
    }

    /// Current location.
    pub fn location(&self) -> &PlayerLocation {
        &self.location
    }

    /// Apply an event, returning the new state or an error.
    pub fn apply(&self, event: PlayerEvent) -> Result<Self, InvalidTransition> {
        let location = self.transition(&event)?;
        Ok(Self { location })
    }

    /// Apply an event in place, returning error if invalid.
    pub fn apply_mut(&mut self, event: PlayerEvent) -> Result<(), InvalidTransition> {
        self.location = self.transition(&event)?;
        Ok(())
    }

    fn transition(&self, event: &PlayerEvent) -> Result<PlayerLocation, InvalidTransition> {
        use PlayerEvent::*;
        use PlayerLocation::*;

        let invalid = |reason: &'static str| InvalidTransition {
            from: self.location.clone(),
            event: event.clone(),
            reason,
        };

        match (&self.location, event) {
            (Disconnected, Connect) => Ok(Connected),
            (_, Connect) => Err(invalid("Already connected")),

            (Disconnected, Disconnect) => Err(invalid("Already disconnected")),
            (_, Disconnect) => Ok(Disconnected),

            (Connected, JoinSession { session_id }) => Ok(InSession {
                session_id: session_id.clone(),
            }),
            (Disconnected, JoinSession { .. }) => Err(invalid("Must connect first")),
            (_, JoinSession { .. }) => Err(invalid("Already in a session")),

            (InSession { .. } | Playing { .. }, LeaveSession) => Ok(Connected),
            (_, LeaveSession) => Err(invalid("Not in a session")),

            (InSession { session_id }, StartGame) => Ok(Playing {
                session_id: session_id.clone(),
            }),
            (Playing { .. }, StartGame) => Err(invalid("Already playing")),
            (_, StartGame) => Err(invalid("Must be in a session to start a game")),

            (Playing { session_id }, LeaveGame | GameOver) => Ok(InSession {
                session_id: session_id.clone(),
            }),
            (_, LeaveGame | GameOver) => Err(invalid("Not in a game")),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.location.is_connected()
    }

    pub fn is_in_session(&self) -> bool {
        self.location.is_in_session()
    }

    pub fn is_playing(&self) -> bool {
        self.location.is_playing()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.location.session_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_session(id: &str) -> PlayerState {
        PlayerState::new()
            .apply(PlayerEvent::Connect)
            .unwrap()
            .apply(PlayerEvent::JoinSession {
                session_id: id.to_string(),
            })
            .unwrap()
    }

    #[test]
    fn test_initial_state() {
        let state = PlayerState::new();
        assert!(!state.is_connected());
        assert_eq!(*state.location(), PlayerLocation::Disconnected);
    }

    #[test]
    fn test_connected_constructor() {
        let state = PlayerState::connected();
        assert_eq!(*state.location(), PlayerLocation::Connected);
        assert!(state.apply(PlayerEvent::Connect).is_err());
    }

    #[test]
    fn test_session_flow() {
        let mut state = in_session("ABC123");
        assert!(state.is_in_session());
        assert!(!state.is_playing());
        assert_eq!(state.session_id(), Some("ABC123"));

        state.apply_mut(PlayerEvent::StartGame).unwrap();
        assert!(state.is_playing());
        assert_eq!(state.session_id(), Some("ABC123"));

        state.apply_mut(PlayerEvent::GameOver).unwrap();
        assert!(!state.is_playing());
        assert!(state.is_in_session());

        state.apply_mut(PlayerEvent::LeaveSession).unwrap();
        assert!(state.is_connected());
        assert_eq!(state.session_id(), None);
    }

    #[test]
    fn test_leave_session_while_playing() {
        let mut state = in_session("ABC123");
        state.apply_mut(PlayerEvent::StartGame).unwrap();
        state.apply_mut(PlayerEvent::LeaveSession).unwrap();
        assert_eq!(*state.location(), PlayerLocation::Connected);
    }

    #[test]
    fn test_invalid_transitions() {
        let state = PlayerState::new();
        assert!(state
            .apply(PlayerEvent::JoinSession {
                session_id: "X".to_string()
            })
            .is_err());

        let connected = state.apply(PlayerEvent::Connect).unwrap();
        assert!(connected.apply(PlayerEvent::Connect).is_err());
        assert!(connected.apply(PlayerEvent::StartGame).is_err());
        assert!(connected.apply(PlayerEvent::LeaveGame).is_err());

        let seated = in_session("ABC123");
        let err = seated
            .apply(PlayerEvent::JoinSession {
                session_id: "OTHER".to_string(),
            })
            .unwrap_err();
        assert_eq!(err.reason, "Already in a session");
        assert!(seated.apply(PlayerEvent::LeaveGame).is_err());
    }

    #[test]
    fn test_display() {
        let loc = PlayerLocation::Playing {
            session_id: "ABC123".to_string(),
        };
        assert_eq!(format!("{}", loc), "Playing(ABC123)");
    }
}
