//! Turn order, departures and end conditions.
//!
//! Seats never move once a match starts. Eliminated or departed players stay
//! in the seat list with `active == false` and are skipped when the turn
//! passes.

use rand::Rng;
use serde::Serialize;

use super::game::{ActionOutcome, GameState, Notification, NotificationDetail, Phase};
use super::territory::{TerritoryId, TERRITORY_COUNT};

/// Why a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    /// Every other player was eliminated or left
    LastPlayerStanding,
    /// One player holds the whole board
    WorldConquered,
    /// Nobody is left
    NoPlayersRemaining,
}

/// Final result of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameResult {
    pub winner_index: Option<usize>,
    pub winner_name: Option<String>,
    pub reason: FinishReason,
}

/// What happened when a player was taken out of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub player_index: usize,
    pub player_name: String,
    /// The turn moved to this seat because the leaver was the current player.
    pub next_player: Option<usize>,
    /// Each former territory and the seat it went to.
    pub redistributed: Vec<(TerritoryId, usize)>,
}

impl GameState {
    /// Next active seat after the current one, wrapping around. The current
    /// seat itself is checked last.
    pub fn skip_to_next_active(&self) -> Option<usize> {
        let count = self.players.len();
        (1..=count)
            .map(|step| (self.current_player + step) % count)
            .find(|&seat| self.players[seat].active)
    }

    /// Pass the turn after fortify: next active player, reinforce phase,
    /// fresh pool.
    pub(crate) fn start_next_turn(&mut self) -> ActionOutcome {
        self.phase = Phase::Reinforce;
        let Some(next) = self.skip_to_next_active() else {
            return ActionOutcome {
                notifications: Vec::new(),
                result: self.end_condition(),
            };
        };

        self.current_player = next;
        let pool = self.reinforcements_for(next);
        self.players[next].reinforcements = pool;

        ActionOutcome {
            notifications: vec![Notification {
                message: format!(
                    "{}'s turn with {} reinforcements",
                    self.players[next].name, pool
                ),
                detail: NotificationDetail::TurnStarted {
                    player: next,
                    reinforcements: pool,
                },
            }],
            result: None,
        }
    }

    /// Take a player out of the match by identity.
    ///
    /// Their territories are handed out one at a time to random active
    /// players with a single troop each. Returns `None` if the identity has no
    /// seat.
    pub fn remove_player<R: Rng + ?Sized>(
        &mut self,
        client_id: &str,
        rng: &mut R,
    ) -> Option<Departure> {
        let index = self.player_index(client_id)?;

        let player = &mut self.players[index];
        player.active = false;
        let captured: Vec<TerritoryId> = std::mem::take(&mut player.territories)
            .into_iter()
            .collect();
        let player_name = player.name.clone();

        for &id in &captured {
            if let Some(t) = self.territories.get_mut(id as usize - 1) {
                t.owner = None;
            }
        }

        let mut next_player = None;
        if index == self.current_player {
            if let Some(next) = self.skip_to_next_active() {
                self.current_player = next;
                self.phase = Phase::Reinforce;
                let pool = self.reinforcements_for(next);
                self.players[next].reinforcements = pool;
                next_player = Some(next);
            }
        }

        let active = self.active_players();
        let mut redistributed = Vec::with_capacity(captured.len());
        if !active.is_empty() {
            for id in captured {
                let seat = active[rng.gen_range(0..active.len())];
                if let Some(t) = self.territories.get_mut(id as usize - 1) {
                    t.owner = Some(seat);
                    t.troops = 1;
                }
                self.players[seat].territories.insert(id);
                redistributed.push((id, seat));
            }
        }

        tracing::info!(
            player = %player_name,
            territories = redistributed.len(),
            "player removed from game"
        );

        Some(Departure {
            player_index: index,
            player_name,
            next_player,
            redistributed,
        })
    }

    /// Winner or draw based on how many players are still active.
    pub fn end_condition(&self) -> Option<GameResult> {
        let active = self.active_players();
        match active.as_slice() {
            [] => Some(GameResult {
                winner_index: None,
                winner_name: None,
                reason: FinishReason::NoPlayersRemaining,
            }),
            [winner] => Some(self.win_for(*winner, FinishReason::LastPlayerStanding)),
            _ => None,
        }
    }

    /// End condition, plus an immediate win for anyone holding the whole board.
    pub fn check_win_condition(&self) -> Option<GameResult> {
        if let Some(result) = self.end_condition() {
            return Some(result);
        }
        self.players
            .iter()
            .position(|p| p.active && p.territory_count() == TERRITORY_COUNT)
            .map(|seat| self.win_for(seat, FinishReason::WorldConquered))
    }

    fn win_for(&self, seat: usize, reason: FinishReason) -> GameResult {
        GameResult {
            winner_index: Some(seat),
            winner_name: self.players.get(seat).map(|p| p.name.clone()),
            reason,
        }
    }
}
