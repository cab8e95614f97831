//! Command handling.
//!
//! [`Server`] owns the registries and turns one client command into the events
//! the transport should deliver. Every command that touches a room holds that
//! room's lock for its whole check-then-write, so two commands for the same
//! room never interleave while commands for different rooms run in parallel.
//!
//! Lock order: map guards from either registry are never held across a room
//! lock. While a room is locked the handlers may update connections, refresh
//! the room's session-list entry and drop the room from the registry.
//!
//! A client's location in the connection registry is claimed while the target
//! room is locked. If the claim fails (the client joined somewhere else in the
//! meantime, or disconnected) the room change is undone before the lock is
//! released, so a room never keeps a member whose connection points elsewhere.

use super::chat::ChatMessage;
use super::config::{sanitize, ConfigError, ServerConfig};
use super::connection::{ClientId, Connection, ConnectionError, ConnectionManager, DEFAULT_DISPLAY_NAME};
use super::game::GameAction;
use super::player::PlayerEvent;
use super::protocol::{ClientCommand, Outbound, ServerEvent};
use super::room::{lock_room, LobbyMember, Room, RoomError, RoomHandle, RoomManager, SessionId};
use super::turn::GameResult;

/// Session server state.
#[derive(Debug, Default)]
pub struct Server {
    config: ServerConfig,
    connections: ConnectionManager,
    rooms: RoomManager,
}

impl Server {
    pub fn new(config: ServerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            connections: ConnectionManager::new(),
            rooms: RoomManager::new(),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    /// Register a new connection and send it the session list.
    pub fn connect(&self, client_id: ClientId, display_name: Option<String>) -> Vec<Outbound> {
        let name = display_name
            .map(|n| sanitize(&n, self.config.max_display_name_len))
            .filter(|n| !n.is_empty());
        tracing::info!(client = %client_id, "client connected");
        self.connections.add(Connection::new(client_id.clone(), name));
        vec![Outbound::to_client(client_id, self.session_list())]
    }

    /// Drop a connection and take the client out of its session.
    ///
    /// The connection record goes first so that no join racing with the
    /// disconnect can claim a location for it afterwards.
    pub fn disconnect(&self, client_id: &str) -> Vec<Outbound> {
        let Some(conn) = self.connections.remove(client_id) else {
            return Vec::new();
        };
        tracing::info!(client = %client_id, "client disconnected");

        let Some(session_id) = conn.state.session_id() else {
            return Vec::new();
        };
        let mut out = Vec::new();
        self.leave_room(client_id, session_id, &mut out);
        out.push(Outbound::broadcast(self.session_list()));
        out
    }

    /// Handle a raw command. Text that is not a valid command is answered
    /// with `invalid-command` and changes nothing.
    pub fn handle_json(&self, client_id: &str, input: &str) -> Vec<Outbound> {
        match ClientCommand::parse(input) {
            Ok(command) => self.handle(client_id, command),
            Err(e) => {
                tracing::debug!(client = %client_id, error = %e, "unparseable command");
                vec![error_to(client_id, "invalid-command")]
            }
        }
    }

    /// Handle one command from a connected client.
    pub fn handle(&self, client_id: &str, command: ClientCommand) -> Vec<Outbound> {
        if !self.connections.contains(client_id) {
            tracing::debug!(client = %client_id, command = command.name(), "command from unknown client");
            return Vec::new();
        }
        self.connections.touch(client_id);

        match command {
            ClientCommand::CreateSession { name, capacity } => {
                self.create_session(client_id, &name, capacity)
            }
            ClientCommand::JoinSession { session_id } => self.join_session(client_id, &session_id),
            ClientCommand::LeaveSession => self.leave_session(client_id),
            ClientCommand::LeaveGame => self.leave_game(client_id),
            ClientCommand::StartGame => self.start_game(client_id),
            ClientCommand::GameAction(payload) => self.game_action(client_id, payload),
            ClientCommand::SetDisplayName { name } => self.set_display_name(client_id, &name),
            ClientCommand::SendChat { text } => self.send_chat(client_id, &text),
            ClientCommand::ListSessions => vec![Outbound::to_client(client_id, self.session_list())],
        }
    }

    fn session_list(&self) -> ServerEvent {
        ServerEvent::SessionList(self.rooms.summaries())
    }

    fn create_session(&self, client_id: &str, name: &str, capacity: Option<usize>) -> Vec<Outbound> {
        if self.connections.session_of(client_id).is_some() {
            return vec![error_to(client_id, "already-in-session")];
        }
        let host_name = self.display_name(client_id);
        let mut name = sanitize(name, self.config.max_session_name_len);
        if name.is_empty() {
            name = format!("{}'s game", host_name);
        }

        let (session_id, handle) = self.rooms.create(
            name,
            LobbyMember::new(client_id.to_string(), host_name),
            self.config.capacity(capacity),
            self.config.chat_history_limit,
            &mut rand::thread_rng(),
        );

        let lobby = {
            let mut room = lock_room(&handle);
            if let Err(e) = self.enter_session(client_id, &session_id) {
                tracing::debug!(client = %client_id, session = %session_id, error = %e, "create abandoned");
                room.leave(client_id);
                if room.is_empty() {
                    self.rooms.remove(&mut room);
                } else {
                    self.rooms.publish(&room);
                }
                return vec![error_to(client_id, "already-in-session")];
            }
            room.to_json()
        };

        vec![
            Outbound::to_client(client_id, ServerEvent::SessionCreated(lobby)),
            Outbound::broadcast(self.session_list()),
        ]
    }

    fn join_session(&self, client_id: &str, session_id: &str) -> Vec<Outbound> {
        if self.connections.session_of(client_id).is_some() {
            return vec![error_to(client_id, "already-in-session")];
        }
        let Some(handle) = self.rooms.get(session_id) else {
            return vec![error_to(client_id, RoomError::NotFound.reason())];
        };
        let member = LobbyMember::new(client_id.to_string(), self.display_name(client_id));

        let (lobby, others) = {
            let mut room = lock_room(&handle);
            if let Err(e) = room.join(member) {
                tracing::debug!(client = %client_id, session = %session_id, error = %e, "join refused");
                return vec![error_to(client_id, e.reason())];
            }
            if let Err(e) = self.enter_session(client_id, &room.id) {
                tracing::debug!(client = %client_id, session = %session_id, error = %e, "join undone");
                room.leave(client_id);
                return vec![error_to(client_id, "already-in-session")];
            }
            self.rooms.publish(&room);
            tracing::info!(client = %client_id, session = %room.id, "joined session");
            (room.to_json(), other_members(&room, client_id))
        };

        vec![
            Outbound::to_client(client_id, ServerEvent::SessionJoined(lobby.clone())),
            Outbound::to_clients(others, ServerEvent::SessionUpdated(lobby)),
            Outbound::broadcast(self.session_list()),
        ]
    }

    fn leave_session(&self, client_id: &str) -> Vec<Outbound> {
        let Some(session_id) = self.connections.session_of(client_id) else {
            tracing::debug!(client = %client_id, "leave-session outside a session");
            return Vec::new();
        };
        let mut out = Vec::new();
        self.leave_room(client_id, &session_id, &mut out);
        self.leave_location(client_id);

        tracing::info!(client = %client_id, session = %session_id, "left session");
        out.push(Outbound::to_client(client_id, ServerEvent::SessionLeft { session_id }));
        out.push(Outbound::broadcast(self.session_list()));
        out
    }

    fn leave_game(&self, client_id: &str) -> Vec<Outbound> {
        let Some(handle) = self.playing_room(client_id) else {
            tracing::debug!(client = %client_id, "leave-game outside a game");
            return Vec::new();
        };
        let mut out = Vec::new();
        {
            let mut room = lock_room(&handle);
            if let Err(e) = self.connections.apply_event(client_id, PlayerEvent::LeaveGame) {
                tracing::debug!(client = %client_id, error = %e, "leave-game transition skipped");
            }
            self.depart_game(&mut room, client_id, &mut out);
            self.rooms.publish(&room);
        }
        out.push(Outbound::broadcast(self.session_list()));
        out
    }

    fn start_game(&self, client_id: &str) -> Vec<Outbound> {
        let Some(handle) = self.current_room(client_id) else {
            return vec![error_to(client_id, RoomError::NotFound.reason())];
        };

        let (members, snapshot) = {
            let mut room = lock_room(&handle);
            let snapshot = match room.start(
                client_id,
                self.config.min_players_to_start,
                &mut rand::thread_rng(),
            ) {
                Ok(game) => game.to_json(),
                Err(e) => {
                    tracing::debug!(client = %client_id, error = %e, "start refused");
                    return vec![error_to(client_id, e.reason())];
                }
            };
            let members = room.member_ids();
            self.connections
                .apply_event_all(&members, PlayerEvent::StartGame);
            self.rooms.publish(&room);
            (members, snapshot)
        };

        vec![
            Outbound::to_clients(members, ServerEvent::GameStarted(snapshot)),
            Outbound::broadcast(self.session_list()),
        ]
    }

    fn game_action(&self, client_id: &str, payload: serde_json::Value) -> Vec<Outbound> {
        let action = match GameAction::from_json(payload) {
            Ok(action) => action,
            Err(e) => {
                tracing::debug!(client = %client_id, error = %e, "dropping malformed game action");
                return Vec::new();
            }
        };
        let Some(session_id) = self.connections.session_of(client_id) else {
            return vec![error_to(client_id, "player-not-found")];
        };
        let Some(handle) = self.rooms.get(&session_id) else {
            return vec![error_to(client_id, RoomError::NotFound.reason())];
        };

        let mut out = Vec::new();
        let finished = {
            let mut room = lock_room(&handle);
            let outcome = match room.apply_action(client_id, &action, &mut rand::thread_rng()) {
                Ok(outcome) => outcome,
                Err(rejection) if rejection.is_reported() => {
                    tracing::debug!(
                        client = %client_id,
                        action = action.name(),
                        reason = rejection.reason(),
                        "action rejected"
                    );
                    return vec![error_to(client_id, rejection.reason())];
                }
                Err(rejection) => {
                    tracing::debug!(
                        client = %client_id,
                        action = action.name(),
                        error = %rejection,
                        "action ignored"
                    );
                    return Vec::new();
                }
            };

            let members = room.member_ids();
            for notification in outcome.notifications {
                out.push(Outbound::to_clients(
                    members.clone(),
                    ServerEvent::Notification(notification),
                ));
            }
            if let Some(game) = &room.game {
                out.push(Outbound::to_clients(
                    members,
                    ServerEvent::GameStateUpdate(game.to_json()),
                ));
            }
            match outcome.result {
                Some(result) => {
                    self.finish_game(&room, result, &mut out);
                    true
                }
                None => false,
            }
        };

        if finished {
            out.push(Outbound::broadcast(self.session_list()));
        }
        out
    }

    fn set_display_name(&self, client_id: &str, name: &str) -> Vec<Outbound> {
        let name = sanitize(name, self.config.max_display_name_len);
        if name.is_empty() {
            return vec![error_to(client_id, "invalid-command")];
        }
        self.connections.set_display_name(client_id, name.clone());

        let mut out = vec![Outbound::to_client(
            client_id,
            ServerEvent::DisplayNameSet { name: name.clone() },
        )];
        if let Some(handle) = self.current_room(client_id) {
            let mut room = lock_room(&handle);
            if room.rename_member(client_id, &name) {
                self.rooms.publish(&room);
                out.push(Outbound::to_clients(
                    room.member_ids(),
                    ServerEvent::SessionUpdated(room.to_json()),
                ));
            }
        }
        out
    }

    fn send_chat(&self, client_id: &str, text: &str) -> Vec<Outbound> {
        let text = sanitize(text, self.config.max_chat_message_len);
        if text.is_empty() {
            return Vec::new();
        }
        let Some(handle) = self.current_room(client_id) else {
            tracing::debug!(client = %client_id, "chat outside a session");
            return Vec::new();
        };

        let message = ChatMessage::new(client_id.to_string(), self.display_name(client_id), text);
        let mut room = lock_room(&handle);
        room.post_chat(message.clone());
        vec![Outbound::to_clients(
            room.member_ids(),
            ServerEvent::Chat(message),
        )]
    }

    /// Remove a client from a room's lobby and match, deleting the room once
    /// it is empty. The client's own location is left to the caller.
    fn leave_room(&self, client_id: &str, session_id: &str, out: &mut Vec<Outbound>) {
        let Some(handle) = self.rooms.get(session_id) else {
            return;
        };
        let mut room = lock_room(&handle);
        room.leave(client_id);
        self.depart_game(&mut room, client_id, out);

        if room.is_empty() {
            self.rooms.remove(&mut room);
        } else {
            self.rooms.publish(&room);
            out.push(Outbound::to_clients(
                room.member_ids(),
                ServerEvent::SessionUpdated(room.to_json()),
            ));
        }
    }

    /// Take a client out of the room's running match, if they are in it, and
    /// finish the match if that leaves one or zero players.
    fn depart_game(&self, room: &mut Room, client_id: &str, out: &mut Vec<Outbound>) {
        let Some(departure) = room.remove_from_game(client_id, &mut rand::thread_rng()) else {
            return;
        };
        let members = room.member_ids();
        out.push(Outbound::to_clients(
            members.clone(),
            ServerEvent::PlayerLeftGame {
                player_index: departure.player_index,
                player_name: departure.player_name,
            },
        ));

        let result = room.check_end_condition();
        if let Some(game) = &room.game {
            out.push(Outbound::to_clients(
                members,
                ServerEvent::GameStateUpdate(game.to_json()),
            ));
        }
        if let Some(result) = result {
            self.finish_game(room, result, out);
        }
    }

    fn finish_game(&self, room: &Room, result: GameResult, out: &mut Vec<Outbound>) {
        let members = room.member_ids();
        self.connections
            .apply_event_all(&members, PlayerEvent::GameOver);
        self.rooms.publish(room);
        out.push(Outbound::to_clients(members, ServerEvent::GameFinished(result)));
    }

    /// Claim the client's location for a session. Fails if the client is
    /// already seated elsewhere or no longer connected.
    fn enter_session(&self, client_id: &str, session_id: &SessionId) -> Result<(), ConnectionError> {
        let event = PlayerEvent::JoinSession {
            session_id: session_id.clone(),
        };
        self.connections.apply_event(client_id, event)
    }

    fn leave_location(&self, client_id: &str) {
        if let Err(e) = self.connections.apply_event(client_id, PlayerEvent::LeaveSession) {
            tracing::debug!(client = %client_id, error = %e, "leave transition skipped");
        }
    }

    fn display_name(&self, client_id: &str) -> String {
        self.connections
            .display_name(client_id)
            .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string())
    }

    fn current_room(&self, client_id: &str) -> Option<RoomHandle> {
        let session_id = self.connections.session_of(client_id)?;
        self.rooms.get(&session_id)
    }

    fn playing_room(&self, client_id: &str) -> Option<RoomHandle> {
        let playing = self
            .connections
            .get(client_id)
            .map(|c| c.state.is_playing())
            .unwrap_or(false);
        if playing {
            self.current_room(client_id)
        } else {
            None
        }
    }
}

fn error_to(client_id: &str, reason: &'static str) -> Outbound {
    Outbound::to_client(client_id, ServerEvent::error(reason))
}

/// Members other than `client_id`.
fn other_members(room: &Room, client_id: &str) -> Vec<ClientId> {
    room.members()
        .filter(|m| m.client_id != client_id)
        .map(|m| m.client_id.clone())
        .collect()
}
