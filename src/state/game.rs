//! Game state management.
//!
//! A [`GameState`] is created from a room's membership when the host starts
//! the match and is then only changed through [`GameState::apply_action`] and
//! the departure handling in [`super::turn`].

use std::collections::BTreeSet;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::combat::{self, BattleOutcome};
use super::connection::ClientId;
use super::territory::{self, TerritoryDef, TerritoryId, REGIONS, TERRITORY_COUNT};
use super::turn::GameResult;

/// Player colors, in seat order. The palette length bounds the player count.
pub const PLAYER_COLORS: [&str; 6] = [
    "#e74c3c", "#3498db", "#2ecc71", "#f1c40f", "#9b59b6", "#e67e22",
];

/// Maximum players in one match.
pub const MAX_PLAYERS: usize = PLAYER_COLORS.len();

/// Floor for the per-turn reinforcement pool.
pub const MIN_REINFORCEMENTS: u32 = 3;

/// Turn phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Reinforce,
    Attack,
    Fortify,
}

impl Phase {
    /// Wire name of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reinforce => "reinforce",
            Self::Attack => "attack",
            Self::Fortify => "fortify",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base reinforcements for a territory count, before region bonuses.
pub fn base_reinforcements(territory_count: usize) -> u32 {
    MIN_REINFORCEMENTS.max((territory_count / 3) as u32)
}

/// Runtime state of one territory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Territory {
    pub id: TerritoryId,
    pub owner: Option<usize>,
    pub troops: u32,
}

impl Territory {
    /// Static definition (name, position, neighbors).
    pub fn def(&self) -> &'static TerritoryDef {
        &territory::TERRITORIES[self.id as usize - 1]
    }

    /// Client view, merged with the static definition.
    pub fn to_json(&self) -> serde_json::Value {
        let def = self.def();
        serde_json::json!({
            "id": self.id,
            "name": def.name,
            "x": def.position.0,
            "y": def.position.1,
            "adjacent": def.neighbors,
            "owner": self.owner,
            "troops": self.troops
        })
    }
}

/// A player seat in a match.
#[derive(Debug, Clone)]
pub struct GamePlayer {
    /// Connection identity, shared with the lobby member it was created from
    pub client_id: ClientId,

    /// Display name at game start
    pub name: String,

    pub color: &'static str,

    /// Owned territories
    pub(crate) territories: BTreeSet<TerritoryId>,

    /// Troops left to place this turn
    pub reinforcements: u32,

    /// Banked battle rewards, redeemable during reinforce
    pub battle_rewards: u32,

    /// False once eliminated or departed
    pub active: bool,
}

impl GamePlayer {
    /// Create an active seat with no territories.
    pub fn new(client_id: ClientId, name: String, color: &'static str) -> Self {
        Self {
            client_id,
            name,
            color,
            territories: BTreeSet::new(),
            reinforcements: 0,
            battle_rewards: 0,
            active: true,
        }
    }

    /// Owned territory ids, ascending.
    pub fn territories(&self) -> &BTreeSet<TerritoryId> {
        &self.territories
    }

    /// Number of owned territories.
    pub fn territory_count(&self) -> usize {
        self.territories.len()
    }

    /// Check if this player owns a territory.
    pub fn owns(&self, id: TerritoryId) -> bool {
        self.territories.contains(&id)
    }

    /// Client view of the seat.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.client_id,
            "name": self.name,
            "color": self.color,
            "territories": self.territories,
            "reinforcements": self.reinforcements,
            "battle_rewards": self.battle_rewards,
            "active": self.active
        })
    }
}

/// An action submitted by the current player.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum GameAction {
    #[serde(rename_all = "camelCase")]
    Reinforce { territory_id: TerritoryId },
    UseBattleRewards,
    #[serde(rename_all = "camelCase")]
    Attack {
        source_id: TerritoryId,
        target_id: TerritoryId,
        troop_count: u32,
    },
    #[serde(rename_all = "camelCase")]
    Fortify {
        source_id: TerritoryId,
        target_id: TerritoryId,
        troop_count: u32,
    },
    EndPhase { phase: Phase },
}

impl GameAction {
    /// Parse a `game-action` payload.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Phase the action is legal in. For `end-phase` this is the phase the
    /// client believes it is ending.
    pub fn required_phase(&self) -> Phase {
        match self {
            Self::Reinforce { .. } | Self::UseBattleRewards => Phase::Reinforce,
            Self::Attack { .. } => Phase::Attack,
            Self::Fortify { .. } => Phase::Fortify,
            Self::EndPhase { phase } => *phase,
        }
    }

    /// Wire name of the action type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Reinforce { .. } => "reinforce",
            Self::UseBattleRewards => "use-battle-rewards",
            Self::Attack { .. } => "attack",
            Self::Fortify { .. } => "fortify",
            Self::EndPhase { .. } => "end-phase",
        }
    }
}

/// Why an action was not applied.
///
/// Only the actor checks are reported back to the client; everything else is
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionRejection {
    #[error("player not found in this game")]
    PlayerNotFound,
    #[error("player is no longer active")]
    PlayerInactive,
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("no game in progress")]
    GameNotActive,
    #[error("action needs the {expected} phase, game is in {actual}")]
    WrongPhase { expected: Phase, actual: Phase },
    #[error("{0}")]
    Invalid(&'static str),
}

impl ActionRejection {
    /// Short machine-readable reason.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::PlayerNotFound => "player-not-found",
            Self::PlayerInactive => "player-inactive",
            Self::NotYourTurn => "not-your-turn",
            Self::GameNotActive => "game-not-active",
            Self::WrongPhase { .. } => "wrong-phase",
            Self::Invalid(_) => "invalid-action",
        }
    }

    /// Whether the client gets an `action-error` for this.
    pub fn is_reported(&self) -> bool {
        matches!(
            self,
            Self::PlayerNotFound | Self::PlayerInactive | Self::NotYourTurn
        )
    }
}

/// Errors creating a game from a membership snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameSetupError {
    #[error("a game needs at least one player")]
    NoPlayers,
    #[error("{count} players exceeds the maximum of {max}")]
    TooManyPlayers { count: usize, max: usize },
}

/// Structural problems that must never be observed during play.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("territory {0} has no owner")]
    Unowned(TerritoryId),
    #[error("territory {0} has no troops")]
    NoTroops(TerritoryId),
    #[error("territory {0} owner disagrees with player territory sets")]
    OwnershipMismatch(TerritoryId),
    #[error("player {0} is inactive but still owns territory")]
    InactiveOwner(usize),
    #[error("player territory sets cover {0} territories")]
    Coverage(usize),
}

/// Something players should be told about.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    #[serde(flatten)]
    pub detail: NotificationDetail,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NotificationDetail {
    Battle {
        attacker: usize,
        defender: usize,
        source: TerritoryId,
        target: TerritoryId,
        committed: u32,
        defending: u32,
        outcome: BattleOutcome,
    },
    RewardGranted { player: usize, amount: u32 },
    RewardsRedeemed { player: usize, amount: u32 },
    Eliminated { player: usize, by: Option<usize> },
    TurnStarted { player: usize, reinforcements: u32 },
}

/// Result of a successfully applied action.
#[derive(Debug, Clone, Default)]
pub struct ActionOutcome {
    pub notifications: Vec<Notification>,
    /// Set when the action ended the game.
    pub result: Option<GameResult>,
}

/// Authoritative match state for one session.
#[derive(Debug, Clone)]
pub struct GameState {
    /// Seats in membership order; indices are stable for the whole match
    pub(crate) players: Vec<GamePlayer>,

    pub current_player: usize,

    pub phase: Phase,

    /// Indexed by `id - 1`
    pub(crate) territories: Vec<Territory>,
}

impl GameState {
    /// Deal the board out to `members` (identity, display name) in order.
    pub fn new<R: Rng + ?Sized>(
        members: &[(ClientId, String)],
        rng: &mut R,
    ) -> Result<Self, GameSetupError> {
        if members.is_empty() {
            return Err(GameSetupError::NoPlayers);
        }
        if members.len() > MAX_PLAYERS {
            return Err(GameSetupError::TooManyPlayers {
                count: members.len(),
                max: MAX_PLAYERS,
            });
        }

        let mut players: Vec<GamePlayer> = members
            .iter()
            .zip(PLAYER_COLORS)
            .map(|((id, name), color)| GamePlayer::new(id.clone(), name.clone(), color))
            .collect();

        let seats = players.len();
        let territories = territory::all_ids()
            .enumerate()
            .map(|(i, id)| {
                let seat = i % seats;
                players[seat].territories.insert(id);
                Territory {
                    id,
                    owner: Some(seat),
                    troops: rng.gen_range(1..=3),
                }
            })
            .collect();

        for player in &mut players {
            player.reinforcements = base_reinforcements(player.territory_count());
        }

        Ok(Self {
            players,
            current_player: 0,
            phase: Phase::Reinforce,
            territories,
        })
    }

    /// All seats in turn order, including inactive ones.
    pub fn players(&self) -> &[GamePlayer] {
        &self.players
    }

    /// Get a seat by index.
    pub fn player(&self, index: usize) -> Option<&GamePlayer> {
        self.players.get(index)
    }

    /// Seat index for a connection identity.
    pub fn player_index(&self, client_id: &str) -> Option<usize> {
        self.players.iter().position(|p| p.client_id == client_id)
    }

    /// The player whose turn it is.
    pub fn current(&self) -> Option<&GamePlayer> {
        self.players.get(self.current_player)
    }

    /// Board state, indexed by `id - 1`.
    pub fn territories(&self) -> &[Territory] {
        &self.territories
    }

    /// Get a territory's runtime state.
    pub fn territory(&self, id: TerritoryId) -> Option<&Territory> {
        if territory::is_valid(id) {
            self.territories.get(id as usize - 1)
        } else {
            None
        }
    }

    fn territory_mut(&mut self, id: TerritoryId) -> Option<&mut Territory> {
        if territory::is_valid(id) {
            self.territories.get_mut(id as usize - 1)
        } else {
            None
        }
    }

    /// Number of players still in the match.
    pub fn active_count(&self) -> usize {
        self.players.iter().filter(|p| p.active).count()
    }

    /// Seat indices of active players.
    pub fn active_players(&self) -> Vec<usize> {
        self.players
            .iter()
            .enumerate()
            .filter(|(_, p)| p.active)
            .map(|(i, _)| i)
            .collect()
    }

    /// Pool a player gets at the start of their turn.
    pub fn reinforcements_for(&self, index: usize) -> u32 {
        self.players
            .get(index)
            .map(|p| base_reinforcements(p.territory_count()) + territory::region_bonus(&p.territories))
            .unwrap_or(0)
    }

    /// Validate and apply one action from `actor`.
    pub fn apply_action<R: Rng + ?Sized>(
        &mut self,
        actor: &str,
        action: &GameAction,
        rng: &mut R,
    ) -> Result<ActionOutcome, ActionRejection> {
        let index = self.validate_actor(actor)?;

        let expected = action.required_phase();
        if expected != self.phase {
            return Err(ActionRejection::WrongPhase {
                expected,
                actual: self.phase,
            });
        }

        let outcome = match *action {
            GameAction::Reinforce { territory_id } => self.reinforce(index, territory_id),
            GameAction::UseBattleRewards => self.use_battle_rewards(index),
            GameAction::Attack {
                source_id,
                target_id,
                troop_count,
            } => self.attack(index, source_id, target_id, troop_count, rng),
            GameAction::Fortify {
                source_id,
                target_id,
                troop_count,
            } => self.fortify(index, source_id, target_id, troop_count),
            GameAction::EndPhase { .. } => Ok(self.end_phase()),
        }?;

        debug_assert!(
            outcome.result.is_some() || self.check_invariants().is_ok(),
            "invariant broken after {}: {:?}",
            action.name(),
            self.check_invariants()
        );

        Ok(outcome)
    }

    fn validate_actor(&self, actor: &str) -> Result<usize, ActionRejection> {
        let index = self
            .player_index(actor)
            .ok_or(ActionRejection::PlayerNotFound)?;
        if !self.players[index].active {
            return Err(ActionRejection::PlayerInactive);
        }
        if index != self.current_player {
            return Err(ActionRejection::NotYourTurn);
        }
        Ok(index)
    }

    fn reinforce(&mut self, index: usize, id: TerritoryId) -> Result<ActionOutcome, ActionRejection> {
        if !self.players[index].owns(id) {
            return Err(ActionRejection::Invalid("territory not owned"));
        }
        if self.players[index].reinforcements == 0 {
            return Err(ActionRejection::Invalid("no reinforcements left"));
        }
        let territory = self
            .territory_mut(id)
            .ok_or(ActionRejection::Invalid("unknown territory"))?;
        territory.troops += 1;
        self.players[index].reinforcements -= 1;
        Ok(ActionOutcome::default())
    }

    fn use_battle_rewards(&mut self, index: usize) -> Result<ActionOutcome, ActionRejection> {
        let player = &mut self.players[index];
        let amount = player.battle_rewards;
        if amount == 0 {
            return Err(ActionRejection::Invalid("no battle rewards banked"));
        }
        player.reinforcements += amount;
        player.battle_rewards = 0;

        Ok(ActionOutcome {
            notifications: vec![Notification {
                message: format!("{} redeemed {} battle reward troops", player.name, amount),
                detail: NotificationDetail::RewardsRedeemed {
                    player: index,
                    amount,
                },
            }],
            result: None,
        })
    }

    fn attack<R: Rng + ?Sized>(
        &mut self,
        index: usize,
        source_id: TerritoryId,
        target_id: TerritoryId,
        committed: u32,
        rng: &mut R,
    ) -> Result<ActionOutcome, ActionRejection> {
        let source = self
            .territory(source_id)
            .ok_or(ActionRejection::Invalid("unknown territory"))?;
        let target = self
            .territory(target_id)
            .ok_or(ActionRejection::Invalid("unknown territory"))?;

        if source.owner != Some(index) {
            return Err(ActionRejection::Invalid("source not owned"));
        }
        let defender = match target.owner {
            Some(owner) if owner != index => owner,
            _ => return Err(ActionRejection::Invalid("target not hostile")),
        };
        if !territory::are_adjacent(source_id, target_id) {
            return Err(ActionRejection::Invalid("territories not adjacent"));
        }
        if committed == 0 || committed >= source.troops {
            return Err(ActionRejection::Invalid("invalid troop count"));
        }

        let defending = target.troops;
        let outcome = combat::resolve_battle(committed, defending, rng);
        let attacker_reward = combat::draw_battle_reward(rng);
        let defender_reward = combat::draw_battle_reward(rng);

        Ok(self.apply_battle(
            BattleReport {
                attacker: index,
                defender,
                source: source_id,
                target: target_id,
                committed,
                defending,
                outcome,
            },
            attacker_reward,
            defender_reward,
        ))
    }

    /// Apply a resolved battle to the board, credit rewards and check for
    /// elimination and victory.
    pub(crate) fn apply_battle(
        &mut self,
        report: BattleReport,
        attacker_reward: u32,
        defender_reward: u32,
    ) -> ActionOutcome {
        let BattleReport {
            attacker,
            defender,
            source,
            target,
            committed,
            defending,
            outcome,
        } = report;

        let source_name = territory::TERRITORIES[source as usize - 1].name;
        let target_name = territory::TERRITORIES[target as usize - 1].name;
        let attacker_name = self.players[attacker].name.clone();
        let defender_name = self.players[defender].name.clone();

        let mut notifications = Vec::new();
        let summary = if outcome.attacker_won {
            format!(
                "{} attacked {} from {} with {} troops and captured it ({} survived)",
                attacker_name, target_name, source_name, committed, outcome.attacker_survivors
            )
        } else {
            format!(
                "{} attacked {} from {} with {} troops; {} held with {} of {} troops",
                attacker_name,
                target_name,
                source_name,
                committed,
                defender_name,
                outcome.defender_survivors,
                defending
            )
        };
        notifications.push(Notification {
            message: summary,
            detail: NotificationDetail::Battle {
                attacker,
                defender,
                source,
                target,
                committed,
                defending,
                outcome,
            },
        });

        if let Some(t) = self.territory_mut(source) {
            t.troops = t.troops.saturating_sub(committed);
        }

        if outcome.attacker_won {
            if let Some(t) = self.territory_mut(target) {
                t.owner = Some(attacker);
                t.troops = outcome.attacker_survivors;
            }
            self.players[defender].territories.remove(&target);
            self.players[attacker].territories.insert(target);
        } else if let Some(t) = self.territory_mut(target) {
            t.troops = outcome.defender_survivors;
        }

        for (seat, name, amount) in [
            (attacker, &attacker_name, attacker_reward),
            (defender, &defender_name, defender_reward),
        ] {
            self.players[seat].battle_rewards += amount;
            notifications.push(Notification {
                message: format!("{} earned a battle reward of {}", name, amount),
                detail: NotificationDetail::RewardGranted {
                    player: seat,
                    amount,
                },
            });
        }

        if outcome.attacker_won && self.players[defender].territories.is_empty() {
            self.players[defender].active = false;
            tracing::info!(
                player = %defender_name,
                by = %attacker_name,
                "player eliminated"
            );
            notifications.push(Notification {
                message: format!("{} was eliminated by {}", defender_name, attacker_name),
                detail: NotificationDetail::Eliminated {
                    player: defender,
                    by: Some(attacker),
                },
            });
        }

        ActionOutcome {
            notifications,
            result: self.check_win_condition(),
        }
    }

    fn fortify(
        &mut self,
        index: usize,
        source_id: TerritoryId,
        target_id: TerritoryId,
        count: u32,
    ) -> Result<ActionOutcome, ActionRejection> {
        if source_id == target_id {
            return Err(ActionRejection::Invalid("source and target are the same"));
        }
        let owned = &self.players[index].territories;
        if !owned.contains(&source_id) || !owned.contains(&target_id) {
            return Err(ActionRejection::Invalid("territory not owned"));
        }
        let available = self.territory(source_id).map(|t| t.troops).unwrap_or(0);
        if count == 0 || count >= available {
            return Err(ActionRejection::Invalid("invalid troop count"));
        }
        if !territory::is_reachable(source_id, target_id, |id| owned.contains(&id)) {
            return Err(ActionRejection::Invalid("no connected path"));
        }

        if let Some(t) = self.territory_mut(source_id) {
            t.troops -= count;
        }
        if let Some(t) = self.territory_mut(target_id) {
            t.troops += count;
        }
        Ok(ActionOutcome::default())
    }

    fn end_phase(&mut self) -> ActionOutcome {
        match self.phase {
            Phase::Reinforce => {
                self.phase = Phase::Attack;
                ActionOutcome::default()
            }
            Phase::Attack => {
                self.phase = Phase::Fortify;
                ActionOutcome::default()
            }
            Phase::Fortify => self.start_next_turn(),
        }
    }

    /// Verify ownership invariants. Only meaningful while the game is live.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for t in &self.territories {
            let owner = t.owner.ok_or(InvariantViolation::Unowned(t.id))?;
            if t.troops == 0 {
                return Err(InvariantViolation::NoTroops(t.id));
            }
            let consistent = self
                .players
                .get(owner)
                .map(|p| p.owns(t.id))
                .unwrap_or(false);
            if !consistent {
                return Err(InvariantViolation::OwnershipMismatch(t.id));
            }
        }

        let mut covered = 0;
        for (i, p) in self.players.iter().enumerate() {
            if !p.active && !p.territories.is_empty() {
                return Err(InvariantViolation::InactiveOwner(i));
            }
            for &id in &p.territories {
                if self.territory(id).and_then(|t| t.owner) != Some(i) {
                    return Err(InvariantViolation::OwnershipMismatch(id));
                }
            }
            covered += p.territories.len();
        }
        if covered != TERRITORY_COUNT {
            return Err(InvariantViolation::Coverage(covered));
        }

        Ok(())
    }

    /// Full snapshot for clients.
    pub fn to_json(&self) -> serde_json::Value {
        let players: Vec<serde_json::Value> = self.players.iter().map(|p| p.to_json()).collect();
        let territories: Vec<serde_json::Value> =
            self.territories.iter().map(|t| t.to_json()).collect();
        let regions: Vec<serde_json::Value> = REGIONS.iter().map(|r| r.to_json()).collect();

        serde_json::json!({
            "players": players,
            "current_player": self.current_player,
            "phase": self.phase.as_str(),
            "territories": territories,
            "regions": regions
        })
    }
}

/// Everything needed to apply a resolved battle.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BattleReport {
    pub attacker: usize,
    pub defender: usize,
    pub source: TerritoryId,
    pub target: TerritoryId,
    pub committed: u32,
    pub defending: u32,
    pub outcome: BattleOutcome,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::state::turn::FinishReason;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    pub(crate) fn members(count: usize) -> Vec<(ClientId, String)> {
        (0..count)
            .map(|i| (format!("client-{}", i), format!("Player{}", i)))
            .collect()
    }

    pub(crate) fn new_game(count: usize) -> GameState {
        let mut rng = StdRng::seed_from_u64(1);
        GameState::new(&members(count), &mut rng).unwrap()
    }

    /// Hand a territory to `seat` with the given troops.
    pub(crate) fn give(game: &mut GameState, id: TerritoryId, seat: usize, troops: u32) {
        let t = &mut game.territories[id as usize - 1];
        if let Some(prev) = t.owner {
            game.players[prev].territories.remove(&id);
        }
        t.owner = Some(seat);
        t.troops = troops;
        game.players[seat].territories.insert(id);
    }

    /// Board where seat 1 owns everything except the listed ids, which go to seat 0.
    fn board_for_seat0(game: &mut GameState, ids: &[TerritoryId]) {
        for id in territory::all_ids() {
            let seat = if ids.contains(&id) { 0 } else { 1 };
            give(game, id, seat, 1);
        }
    }

    #[test]
    fn test_new_game_deals_round_robin() {
        let game = new_game(3);

        assert_eq!(game.players().len(), 3);
        assert_eq!(game.current_player, 0);
        assert_eq!(game.phase, Phase::Reinforce);
        for t in game.territories() {
            assert_eq!(t.owner, Some((t.id as usize - 1) % 3));
            assert!((1..=3).contains(&t.troops));
        }
        for (i, p) in game.players().iter().enumerate() {
            assert_eq!(p.territory_count(), 14);
            assert_eq!(p.reinforcements, 4);
            assert_eq!(p.color, PLAYER_COLORS[i]);
            assert!(p.active);
        }
        game.check_invariants().unwrap();
    }

    #[test]
    fn test_initial_pool_ignores_region_bonus() {
        // Six players get 7 territories each, floor(7/3) = 2 -> minimum of 3.
        let game = new_game(6);
        assert!(game.players().iter().all(|p| p.reinforcements == 3));
    }

    #[test]
    fn test_too_many_players() {
        let mut rng = StdRng::seed_from_u64(1);
        let result = GameState::new(&members(7), &mut rng);
        assert_eq!(
            result.unwrap_err(),
            GameSetupError::TooManyPlayers { count: 7, max: 6 }
        );
    }

    #[test]
    fn test_reinforcement_math_with_region() {
        let mut game = new_game(2);
        // Europe (7) plus two more.
        board_for_seat0(&mut game, &[14, 15, 16, 17, 18, 19, 20, 1, 2]);
        assert_eq!(game.players[0].territory_count(), 9);
        assert_eq!(game.reinforcements_for(0), 8);
        // 33 territories: 11 base plus South America, Africa, Asia and Australia
        assert_eq!(game.reinforcements_for(1), 11 + 2 + 3 + 7 + 2);
    }

    #[test]
    fn test_reinforce() {
        let mut game = new_game(2);
        let mut rng = StdRng::seed_from_u64(2);
        let before = game.territory(1).unwrap().troops;

        game.apply_action("client-0", &GameAction::Reinforce { territory_id: 1 }, &mut rng)
            .unwrap();
        assert_eq!(game.territory(1).unwrap().troops, before + 1);
        assert_eq!(game.players[0].reinforcements, 6);

        // Territory 2 belongs to seat 1
        let result =
            game.apply_action("client-0", &GameAction::Reinforce { territory_id: 2 }, &mut rng);
        assert!(matches!(result, Err(ActionRejection::Invalid(_))));

        game.players[0].reinforcements = 0;
        let result =
            game.apply_action("client-0", &GameAction::Reinforce { territory_id: 1 }, &mut rng);
        assert!(matches!(result, Err(ActionRejection::Invalid(_))));
        assert_eq!(game.territory(1).unwrap().troops, before + 1);
    }

    #[test]
    fn test_actor_validation() {
        let mut game = new_game(3);
        let mut rng = StdRng::seed_from_u64(3);
        let action = GameAction::Reinforce { territory_id: 2 };

        let err = game.apply_action("stranger", &action, &mut rng).unwrap_err();
        assert_eq!(err.reason(), "player-not-found");
        assert!(err.is_reported());

        let err = game.apply_action("client-1", &action, &mut rng).unwrap_err();
        assert_eq!(err.reason(), "not-your-turn");

        game.players[1].active = false;
        let err = game.apply_action("client-1", &action, &mut rng).unwrap_err();
        assert_eq!(err.reason(), "player-inactive");
    }

    #[test]
    fn test_wrong_phase_is_silent() {
        let mut game = new_game(2);
        let mut rng = StdRng::seed_from_u64(4);
        let action = GameAction::Fortify {
            source_id: 1,
            target_id: 3,
            troop_count: 1,
        };
        let err = game.apply_action("client-0", &action, &mut rng).unwrap_err();
        assert!(!err.is_reported());
        assert_eq!(game.phase, Phase::Reinforce);
    }

    #[test]
    fn test_stale_end_phase_is_noop() {
        let mut game = new_game(2);
        let mut rng = StdRng::seed_from_u64(5);

        let stale = GameAction::EndPhase {
            phase: Phase::Attack,
        };
        assert!(game.apply_action("client-0", &stale, &mut rng).is_err());
        assert_eq!(game.phase, Phase::Reinforce);
        assert_eq!(game.current_player, 0);
    }

    #[test]
    fn test_phase_cycle_recomputes_pool() {
        let mut game = new_game(2);
        let mut rng = StdRng::seed_from_u64(6);
        // Seat 1 gets Australia and 8 other territories.
        let mut seat1 = vec![39, 40, 41, 42];
        seat1.extend([1, 2, 3, 4, 5]);
        for id in territory::all_ids() {
            give(&mut game, id, if seat1.contains(&id) { 1 } else { 0 }, 1);
        }
        game.players[1].reinforcements = 0;

        for phase in [Phase::Reinforce, Phase::Attack, Phase::Fortify] {
            game.apply_action("client-0", &GameAction::EndPhase { phase }, &mut rng)
                .unwrap();
        }

        assert_eq!(game.current_player, 1);
        assert_eq!(game.phase, Phase::Reinforce);
        assert_eq!(game.players[1].reinforcements, 3 + 2);
    }

    #[test]
    fn test_use_battle_rewards() {
        let mut game = new_game(2);
        let mut rng = StdRng::seed_from_u64(7);

        let result = game.apply_action("client-0", &GameAction::UseBattleRewards, &mut rng);
        assert!(result.is_err());

        game.players[0].battle_rewards = 5;
        let outcome = game
            .apply_action("client-0", &GameAction::UseBattleRewards, &mut rng)
            .unwrap();
        assert_eq!(game.players[0].battle_rewards, 0);
        assert_eq!(game.players[0].reinforcements, 7 + 5);
        assert_eq!(outcome.notifications.len(), 1);
        assert_eq!(
            outcome.notifications[0].detail,
            NotificationDetail::RewardsRedeemed {
                player: 0,
                amount: 5
            }
        );
    }

    #[test]
    fn test_attack_preconditions() {
        let mut game = new_game(2);
        let mut rng = StdRng::seed_from_u64(8);
        board_for_seat0(&mut game, &[1, 4]);
        give(&mut game, 1, 0, 5);
        game.phase = Phase::Attack;

        let attack = |source_id, target_id, troop_count| GameAction::Attack {
            source_id,
            target_id,
            troop_count,
        };

        // Own territory
        assert!(game.apply_action("client-0", &attack(1, 4, 2), &mut rng).is_err());
        // Not adjacent (Alaska - Greenland)
        assert!(game.apply_action("client-0", &attack(1, 3, 2), &mut rng).is_err());
        // Must leave one behind
        assert!(game.apply_action("client-0", &attack(1, 2, 5), &mut rng).is_err());
        assert!(game.apply_action("client-0", &attack(1, 2, 0), &mut rng).is_err());
        // Unknown territory
        assert!(game.apply_action("client-0", &attack(1, 77, 1), &mut rng).is_err());
        assert_eq!(game.territory(1).unwrap().troops, 5);

        let outcome = game
            .apply_action("client-0", &attack(1, 2, 4), &mut rng)
            .unwrap();
        assert_eq!(game.territory(1).unwrap().troops, 1);
        assert!(matches!(
            outcome.notifications[0].detail,
            NotificationDetail::Battle { .. }
        ));
        game.check_invariants().unwrap();
    }

    #[test]
    fn test_capture_transfers_ownership_and_rewards() {
        let mut game = new_game(3);
        give(&mut game, 1, 0, 4);
        give(&mut game, 2, 1, 2);

        let report = BattleReport {
            attacker: 0,
            defender: 1,
            source: 1,
            target: 2,
            committed: 3,
            defending: 2,
            outcome: BattleOutcome {
                attacker_survivors: 2,
                defender_survivors: 0,
                attacker_won: true,
                rounds: 1,
            },
        };
        let outcome = game.apply_battle(report, 3, 5);

        assert_eq!(game.territory(1).unwrap().troops, 1);
        assert_eq!(game.territory(2).unwrap().owner, Some(0));
        assert_eq!(game.territory(2).unwrap().troops, 2);
        assert!(game.players[0].owns(2));
        assert!(!game.players[1].owns(2));
        assert_eq!(game.players[0].battle_rewards, 3);
        assert_eq!(game.players[1].battle_rewards, 5);
        assert!(outcome.result.is_none());
        game.check_invariants().unwrap();
    }

    #[test]
    fn test_defender_hold() {
        let mut game = new_game(2);
        give(&mut game, 1, 0, 4);
        give(&mut game, 2, 1, 3);

        let report = BattleReport {
            attacker: 0,
            defender: 1,
            source: 1,
            target: 2,
            committed: 3,
            defending: 3,
            outcome: BattleOutcome {
                attacker_survivors: 0,
                defender_survivors: 2,
                attacker_won: false,
                rounds: 2,
            },
        };
        game.apply_battle(report, 1, 2);

        assert_eq!(game.territory(1).unwrap().troops, 1);
        assert_eq!(game.territory(2).unwrap().owner, Some(1));
        assert_eq!(game.territory(2).unwrap().troops, 2);
        game.check_invariants().unwrap();
    }

    #[test]
    fn test_last_territory_eliminates_and_wins() {
        let mut game = new_game(2);
        // Seat 0 owns all but Northwest Territory
        for id in territory::all_ids() {
            give(&mut game, id, if id == 2 { 1 } else { 0 }, 2);
        }

        let report = BattleReport {
            attacker: 0,
            defender: 1,
            source: 1,
            target: 2,
            committed: 1,
            defending: 2,
            outcome: BattleOutcome {
                attacker_survivors: 1,
                defender_survivors: 0,
                attacker_won: true,
                rounds: 2,
            },
        };
        let outcome = game.apply_battle(report, 1, 1);

        assert!(!game.players[1].active);
        assert!(outcome.notifications.iter().any(|n| matches!(
            n.detail,
            NotificationDetail::Eliminated { player: 1, .. }
        )));
        let result = outcome.result.unwrap();
        assert_eq!(result.winner_index, Some(0));
        assert_eq!(result.reason, FinishReason::LastPlayerStanding);
    }

    #[test]
    fn test_fortify_through_owned_chain() {
        let mut game = new_game(2);
        // Alaska -> Alberta -> Western US -> Central America
        board_for_seat0(&mut game, &[1, 4, 7, 9]);
        give(&mut game, 1, 0, 5);
        game.phase = Phase::Fortify;
        let mut rng = StdRng::seed_from_u64(9);

        let action = GameAction::Fortify {
            source_id: 1,
            target_id: 9,
            troop_count: 4,
        };
        game.apply_action("client-0", &action, &mut rng).unwrap();
        assert_eq!(game.territory(1).unwrap().troops, 1);
        assert_eq!(game.territory(9).unwrap().troops, 5);
    }

    #[test]
    fn test_fortify_broken_chain_fails() {
        let mut game = new_game(2);
        board_for_seat0(&mut game, &[1, 4, 9]);
        give(&mut game, 1, 0, 5);
        game.phase = Phase::Fortify;
        let mut rng = StdRng::seed_from_u64(10);

        let action = GameAction::Fortify {
            source_id: 1,
            target_id: 9,
            troop_count: 2,
        };
        assert!(game.apply_action("client-0", &action, &mut rng).is_err());
        assert_eq!(game.territory(1).unwrap().troops, 5);

        // Source must keep one troop
        let action = GameAction::Fortify {
            source_id: 1,
            target_id: 4,
            troop_count: 5,
        };
        assert!(game.apply_action("client-0", &action, &mut rng).is_err());
    }

    #[test]
    fn test_action_payload_parsing() {
        let action = GameAction::from_json(serde_json::json!({
            "type": "attack",
            "sourceId": 1,
            "targetId": 2,
            "troopCount": 3
        }))
        .unwrap();
        assert_eq!(
            action,
            GameAction::Attack {
                source_id: 1,
                target_id: 2,
                troop_count: 3
            }
        );

        let action =
            GameAction::from_json(serde_json::json!({"type": "end-phase", "phase": "fortify"}))
                .unwrap();
        assert_eq!(action.required_phase(), Phase::Fortify);

        assert!(GameAction::from_json(serde_json::json!({"type": "surrender"})).is_err());
        assert!(GameAction::from_json(serde_json::json!({"type": "reinforce"})).is_err());
        assert!(GameAction::from_json(serde_json::json!({
            "type": "reinforce",
            "territoryId": 900
        }))
        .is_err());
    }

    #[test]
    fn test_random_play_keeps_invariants() {
        let mut game = new_game(4);
        let mut rng = StdRng::seed_from_u64(99);

        for _ in 0..3000 {
            let Some(current) = game.current() else { break };
            let actor = current.client_id.clone();
            let owned: Vec<TerritoryId> = current.territories().iter().copied().collect();
            let pick = owned[rng.gen_range(0..owned.len())];
            let neighbor = territory::neighbors(pick)[rng.gen_range(0..territory::neighbors(pick).len())];
            let troops = game.territory(pick).unwrap().troops;

            let action = match (game.phase, rng.gen_range(0..4)) {
                (Phase::Reinforce, 0) => GameAction::EndPhase {
                    phase: Phase::Reinforce,
                },
                (Phase::Reinforce, _) => GameAction::Reinforce { territory_id: pick },
                (Phase::Attack, 0) => GameAction::EndPhase {
                    phase: Phase::Attack,
                },
                (Phase::Attack, _) => GameAction::Attack {
                    source_id: pick,
                    target_id: neighbor,
                    troop_count: troops.saturating_sub(1),
                },
                (Phase::Fortify, 0) => GameAction::Fortify {
                    source_id: pick,
                    target_id: neighbor,
                    troop_count: 1,
                },
                (Phase::Fortify, _) => GameAction::EndPhase {
                    phase: Phase::Fortify,
                },
            };

            let outcome = game.apply_action(&actor, &action, &mut rng);
            game.check_invariants().unwrap();
            if let Ok(ActionOutcome {
                result: Some(result),
                ..
            }) = outcome
            {
                assert_eq!(game.active_count(), 1);
                assert_eq!(result.winner_index, game.active_players().first().copied());
                break;
            }
        }
    }

    #[test]
    fn test_phase_names_and_fresh_seat() {
        assert_eq!(Phase::Reinforce.as_str(), "reinforce");
        assert_eq!(Phase::Attack.to_string(), "attack");
        assert_eq!(
            serde_json::to_value(Phase::Fortify).unwrap(),
            Phase::Fortify.as_str()
        );

        let seat = GamePlayer::new("c".to_string(), "Cara".to_string(), "red");
        assert!(seat.active);
        assert_eq!(seat.territory_count(), 0);
        assert!(seat.territories().is_empty());
        assert!(!seat.owns(1));
        assert_eq!(seat.to_json()["territories"], serde_json::json!([]));
    }

    #[test]
    fn test_snapshot_shape() {
        let game = new_game(2);
        let json = game.to_json();
        assert_eq!(json["phase"], "reinforce");
        assert_eq!(json["players"].as_array().unwrap().len(), 2);
        assert_eq!(json["territories"].as_array().unwrap().len(), 42);
        assert_eq!(json["regions"].as_array().unwrap().len(), 6);
        assert_eq!(json["territories"][0]["name"], "Alaska");
        assert_eq!(json["territories"][0]["adjacent"], serde_json::json!([2, 4, 30]));
    }
}
