//! Dice combat and battle rewards.
//!
//! A battle runs to completion in one call: rounds repeat until one side has
//! no troops left. Attackers roll up to three dice, defenders up to two, and
//! the attacker has to roll strictly higher to take a troop.

use rand::Rng;
use serde::Serialize;

/// Maximum dice rolled by the attacker per round.
pub const MAX_ATTACK_DICE: u32 = 3;

/// Maximum dice rolled by the defender per round.
pub const MAX_DEFENSE_DICE: u32 = 2;

/// Source of six-sided die rolls.
///
/// Every `rand::Rng` is a roller; tests can supply scripted rolls instead.
pub trait DiceRoller {
    /// Roll one die, `1..=6`.
    fn roll_die(&mut self) -> u8;
}

impl<R: Rng + ?Sized> DiceRoller for R {
    fn roll_die(&mut self) -> u8 {
        self.gen_range(1..=6)
    }
}

/// Result of a resolved battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BattleOutcome {
    pub attacker_survivors: u32,
    pub defender_survivors: u32,
    pub attacker_won: bool,
    pub rounds: u32,
}

impl BattleOutcome {
    pub fn attacker_losses(&self, committed: u32) -> u32 {
        committed.saturating_sub(self.attacker_survivors)
    }

    pub fn defender_losses(&self, defending: u32) -> u32 {
        defending.saturating_sub(self.defender_survivors)
    }
}

fn roll_sorted<D: DiceRoller + ?Sized>(dice: &mut D, count: u32) -> Vec<u8> {
    let mut rolls: Vec<u8> = (0..count).map(|_| dice.roll_die()).collect();
    rolls.sort_unstable_by(|a, b| b.cmp(a));
    rolls
}

/// Fight until one side is wiped out.
///
/// Attacker dice are rolled before defender dice in every round.
pub fn resolve_battle<D: DiceRoller + ?Sized>(
    attackers: u32,
    defenders: u32,
    dice: &mut D,
) -> BattleOutcome {
    let mut attacker = attackers;
    let mut defender = defenders;
    let mut rounds = 0;

    while attacker > 0 && defender > 0 {
        rounds += 1;
        let attack_rolls = roll_sorted(dice, attacker.min(MAX_ATTACK_DICE));
        let defense_rolls = roll_sorted(dice, defender.min(MAX_DEFENSE_DICE));

        for (a, d) in attack_rolls.iter().zip(defense_rolls.iter()) {
            if a > d {
                defender -= 1;
            } else {
                attacker -= 1;
            }
        }
    }

    BattleOutcome {
        attacker_survivors: attacker,
        defender_survivors: defender,
        attacker_won: defender == 0,
        rounds,
    }
}

/// Map a draw in `0..100` to a reward.
pub fn reward_for_draw(draw: u32) -> u32 {
    match draw {
        0..=34 => 1,
        35..=59 => 2,
        60..=79 => 3,
        80..=94 => 5,
        _ => 10,
    }
}

/// Draw a random battle reward.
pub fn draw_battle_reward<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    reward_for_draw(rng.gen_range(0..100))
}
