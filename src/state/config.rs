//! Server configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use serde::Deserialize;
use thiserror::Error;

use super::chat::DEFAULT_CHAT_HISTORY;
use super::game::MAX_PLAYERS;

/// Tunables for the session server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Upper bound on session capacity; cannot exceed the color palette
    pub max_players_per_session: usize,

    /// Members needed before the host can start
    pub min_players_to_start: usize,

    /// Capacity used when `create-session` omits one
    pub default_capacity: usize,

    pub chat_history_limit: usize,

    pub max_session_name_len: usize,

    pub max_display_name_len: usize,

    pub max_chat_message_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_players_per_session: MAX_PLAYERS,
            min_players_to_start: 2,
            default_capacity: MAX_PLAYERS,
            chat_history_limit: DEFAULT_CHAT_HISTORY,
            max_session_name_len: 40,
            max_display_name_len: 24,
            max_chat_message_len: 500,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("max_players_per_session must be between 2 and {max}, got {got}")]
    MaxPlayers { got: usize, max: usize },
    #[error("min_players_to_start must be between 2 and max_players_per_session, got {0}")]
    MinPlayers(usize),
}

impl ServerConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=MAX_PLAYERS).contains(&self.max_players_per_session) {
            return Err(ConfigError::MaxPlayers {
                got: self.max_players_per_session,
                max: MAX_PLAYERS,
            });
        }
        if self.min_players_to_start < 2 || self.min_players_to_start > self.max_players_per_session
        {
            return Err(ConfigError::MinPlayers(self.min_players_to_start));
        }
        Ok(())
    }

    /// Clamp a requested capacity into the allowed range.
    pub fn capacity(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_capacity)
            .clamp(self.min_players_to_start, self.max_players_per_session)
    }
}

/// Trim and cut a user-supplied string to at most `max` characters.
pub(crate) fn sanitize(input: &str, max: usize) -> String {
    input.trim().chars().take(max).collect()
}
