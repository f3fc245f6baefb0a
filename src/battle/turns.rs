//! Turn ownership, resource grants, round rollover and win conditions.
//! The battle aggregate is only ever mutated through here and the executor.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::battle::{
    conditions,
    types::{Battle, BattleMode, BattleStatus, Obstacle, Unit, UnitCategory},
};

/// Flat HP price a maxed-out arena unit pays to act again.
pub const DESPERATION_HP_COST: u32 = 2;
/// Obstacles start with this much HP.
pub const OBSTACLE_HP: u32 = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("battle is not active")]
    BattleNotActive,
    #[error("not your turn")]
    NotYourTurn,
    #[error("player not in this battle")]
    UnknownPlayer,
    #[error("unit not found")]
    UnknownUnit,
    #[error("unit belongs to another player")]
    NotYourUnit,
    #[error("unit is dead")]
    DeadUnit,
    #[error("a unit has already been chosen this turn")]
    TurnAlreadyStarted,
    #[error("that unit is not the acting unit")]
    WrongUnit,
    #[error("unit is exhausted")]
    UnitExhausted,
}

/// Resources granted to a unit when its turn begins.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct TurnResources {
    pub moves: u32,
    pub actions: u32,
    pub attacks_banked: u32,
    /// Present when the arena desperation rule fired.
    pub desperation_hp_cost: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Elimination,
    Surrender,
    Exhaustion,
    Abandonment,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Verdict {
    /// `None` is a draw.
    pub winner: Option<Uuid>,
    pub reason: EndReason,
}

/// Everything a turn handover produced, for the session layer to broadcast.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EndTurnOutcome {
    pub forced: bool,
    pub ended_unit: Option<Uuid>,
    pub decay_damage: u32,
    pub unit_defeated_by_decay: bool,
    pub next_player: Option<Uuid>,
    pub new_round: Option<u32>,
    pub verdict: Option<Verdict>,
}

/// Move a waiting battle into the active state: place units and obstacles
/// on random free cells, hand the first turn to `action_order[0]`.
pub fn start_battle<R: Rng + ?Sized>(
    battle: &mut Battle,
    units_per_player: u32,
    obstacle_count: u32,
    rng: &mut R,
) {
    debug_assert_eq!(battle.status, BattleStatus::Waiting);

    let categories = [
        UnitCategory::Champion,
        UnitCategory::Footman,
        UnitCategory::Raider,
    ];
    let owners: Vec<Uuid> = battle.players.iter().map(|p| p.id).collect();
    for owner in owners {
        for i in 0..units_per_player {
            let category = categories[i as usize % categories.len()];
            let (x, y) = random_free_cell(battle, rng);
            battle.units.push(Unit::spawn(owner, category, x, y));
        }
    }
    for _ in 0..obstacle_count {
        let (x, y) = random_free_cell(battle, rng);
        battle.obstacles.push(Obstacle {
            id: Uuid::new_v4(),
            x,
            y,
            hp: OBSTACLE_HP,
            destroyed: false,
        });
    }

    battle.status = BattleStatus::Active;
    battle.round = 1;
    battle.current_turn_index = 0;
    battle.active_unit_id = None;
    battle.push_log("battle started");
}

fn random_free_cell<R: Rng + ?Sized>(battle: &Battle, rng: &mut R) -> (i32, i32) {
    loop {
        let x = rng.random_range(0..battle.width);
        let y = rng.random_range(0..battle.height);
        if battle.cell_free(x, y) {
            return (x, y);
        }
    }
}

/// Choose a unit and grant its turn resources. Only the player at
/// `action_order[current_turn_index]` may do this, once per turn.
pub fn begin_turn(
    battle: &mut Battle,
    player_id: Uuid,
    unit_id: Uuid,
) -> Result<TurnResources, TurnError> {
    if battle.status != BattleStatus::Active {
        return Err(TurnError::BattleNotActive);
    }
    if battle.player(player_id).is_none() {
        return Err(TurnError::UnknownPlayer);
    }
    if battle.current_player_id() != Some(player_id) {
        return Err(TurnError::NotYourTurn);
    }
    if battle.active_unit_id.is_some() {
        return Err(TurnError::TurnAlreadyStarted);
    }

    let unit = battle.unit(unit_id).ok_or(TurnError::UnknownUnit)?;
    if unit.owner_id != player_id {
        return Err(TurnError::NotYourUnit);
    }
    if !unit.is_alive {
        return Err(TurnError::DeadUnit);
    }

    let maxed = unit.action_marks >= unit.category.max_marks();
    let mut desperation_hp_cost = None;
    if maxed {
        match battle.mode {
            // Desperation rule: pay HP, clear the marks, act anyway.
            BattleMode::Arena => desperation_hp_cost = Some(DESPERATION_HP_COST),
            BattleMode::Field => return Err(TurnError::UnitExhausted),
        }
    }

    let unit = battle.unit_mut(unit_id).expect("validated");
    if let Some(cost) = desperation_hp_cost {
        unit.hp = unit.hp.saturating_sub(cost).max(1);
        unit.action_marks = 0;
    }
    unit.moves_left = unit.stats.speed.max(1);
    unit.actions_left = 1;
    unit.attacks_left_this_turn = 0;
    unit.has_started_action = true;

    let resources = TurnResources {
        moves: unit.moves_left,
        actions: unit.actions_left,
        attacks_banked: unit.attacks_left_this_turn,
        desperation_hp_cost,
    };
    battle.active_unit_id = Some(unit_id);
    battle.push_log(format!("unit {unit_id} begins its turn"));
    Ok(resources)
}

/// Voluntary end of the current unit-turn.
pub fn end_turn(
    battle: &mut Battle,
    player_id: Uuid,
    unit_id: Uuid,
) -> Result<EndTurnOutcome, TurnError> {
    if battle.status != BattleStatus::Active {
        return Err(TurnError::BattleNotActive);
    }
    if battle.current_player_id() != Some(player_id) {
        return Err(TurnError::NotYourTurn);
    }
    if let Some(active) = battle.active_unit_id {
        if active != unit_id {
            return Err(TurnError::WrongUnit);
        }
    }
    Ok(hand_over(battle, false))
}

/// Timer expiry: forced end of whatever turn state exists, even if no unit
/// was ever chosen. Harmless on an already-ended battle.
pub fn expire_turn(battle: &mut Battle) -> Option<EndTurnOutcome> {
    if battle.status != BattleStatus::Active {
        return None;
    }
    Some(hand_over(battle, true))
}

fn hand_over(battle: &mut Battle, forced: bool) -> EndTurnOutcome {
    let ended_unit = battle.active_unit_id;
    let mut decay_damage = 0;
    let mut unit_defeated_by_decay = false;

    if let Some(uid) = ended_unit {
        if let Some(unit) = battle.unit_mut(uid) {
            let decay = conditions::end_of_turn(&unit.conditions);
            decay_damage = decay.damage;
            if decay.damage > 0 {
                unit.hp = unit.hp.saturating_sub(decay.damage);
                if unit.hp == 0 {
                    unit.is_alive = false;
                    unit_defeated_by_decay = true;
                }
            }
            unit.remove_conditions(&decay.expiring);
            let max = unit.category.max_marks();
            unit.action_marks = (unit.action_marks + 1).min(max);
            unit.has_started_action = false;
            unit.moves_left = 0;
            unit.actions_left = 0;
            unit.attacks_left_this_turn = 0;
        }
        if unit_defeated_by_decay {
            battle.push_log(format!("unit {uid} succumbs to its wounds"));
        }
    }
    battle.active_unit_id = None;

    if let Some(pid) = battle.current_player_id() {
        if let Some(player) = battle.player_mut(pid) {
            player.acted_this_round += 1;
        }
    }

    // Win conditions may already be met (decay kill, forced end after a defeat).
    if let Some(verdict) = check_battle_end(battle) {
        finish(battle, verdict);
        return EndTurnOutcome {
            forced,
            ended_unit,
            decay_damage,
            unit_defeated_by_decay,
            next_player: None,
            new_round: None,
            verdict: Some(verdict),
        };
    }

    let new_round = advance(battle);
    EndTurnOutcome {
        forced,
        ended_unit,
        decay_damage,
        unit_defeated_by_decay,
        next_player: battle.current_player_id(),
        new_round,
        verdict: None,
    }
}

/// True while the player can still field a unit this battle.
fn eligible(battle: &Battle, player_id: Uuid) -> bool {
    let surrendered = battle
        .player(player_id)
        .map(|p| p.surrendered)
        .unwrap_or(true);
    !surrendered && battle.living_units_of(player_id).next().is_some()
}

/// Advance the cyclic turn index past dead or surrendered players; roll the
/// round over once every eligible player has acted at least once.
fn advance(battle: &mut Battle) -> Option<u32> {
    let mut new_round = None;
    let all_acted = battle
        .players
        .iter()
        .filter(|p| eligible(battle, p.id))
        .all(|p| p.acted_this_round >= 1);
    if all_acted {
        battle.round += 1;
        for p in &mut battle.players {
            p.acted_this_round = 0;
        }
        new_round = Some(battle.round);
        battle.push_log(format!("round {} begins", battle.round));
    }

    let count = battle.action_order.len();
    for _ in 0..count {
        battle.current_turn_index = (battle.current_turn_index + 1) % count;
        let pid = battle.action_order[battle.current_turn_index];
        if eligible(battle, pid) {
            break;
        }
    }
    new_round
}

/// Elimination: distinct owners with a living unit ≤ 1. Field battles also
/// end once every living unit is spent, decided by remaining HP totals.
pub fn check_battle_end(battle: &Battle) -> Option<Verdict> {
    let owners = battle.living_owners();
    if owners.len() <= 1 {
        return Some(Verdict {
            winner: owners.first().copied(),
            reason: EndReason::Elimination,
        });
    }

    if battle.mode == BattleMode::Field {
        let all_spent = battle
            .units
            .iter()
            .filter(|u| u.is_alive)
            .all(|u| u.action_marks >= u.category.max_marks());
        if all_spent {
            let mut best: Option<(Uuid, u32)> = None;
            let mut tied = false;
            for owner in owners {
                let total: u32 = battle.living_units_of(owner).map(|u| u.hp).sum();
                match best {
                    Some((_, hp)) if total > hp => {
                        best = Some((owner, total));
                        tied = false;
                    }
                    Some((_, hp)) if total == hp => tied = true,
                    None => best = Some((owner, total)),
                    _ => {}
                }
            }
            let winner = if tied { None } else { best.map(|(id, _)| id) };
            return Some(Verdict {
                winner,
                reason: EndReason::Exhaustion,
            });
        }
    }
    None
}

/// Close the battle if a defeat just decided it. Called after every unit
/// defeat, mid-turn included.
pub fn resolve_defeat(battle: &mut Battle) -> Option<Verdict> {
    if battle.status != BattleStatus::Active {
        return None;
    }
    let verdict = check_battle_end(battle)?;
    finish(battle, verdict);
    Some(verdict)
}

/// Defeat every unit of `player_id` and close the battle in favour of
/// whoever remains.
pub fn surrender(
    battle: &mut Battle,
    player_id: Uuid,
    reason: EndReason,
) -> Result<Option<Verdict>, TurnError> {
    if battle.status != BattleStatus::Active {
        return Err(TurnError::BattleNotActive);
    }
    let player = battle
        .player_mut(player_id)
        .ok_or(TurnError::UnknownPlayer)?;
    player.surrendered = true;
    for u in battle
        .units
        .iter_mut()
        .filter(|u| u.owner_id == player_id && u.is_alive)
    {
        u.is_alive = false;
        u.has_started_action = false;
    }
    if battle.active_unit_id.map_or(false, |uid| {
        battle.unit(uid).map_or(true, |u| !u.is_alive)
    }) {
        battle.active_unit_id = None;
    }
    battle.push_log(format!("player {player_id} surrendered"));

    let verdict = check_battle_end(battle).map(|v| Verdict { reason, ..v });
    if let Some(v) = verdict {
        finish(battle, v);
    } else if battle.current_player_id() == Some(player_id) {
        // Hand the turn on so the battle cannot stall on the leaver.
        advance(battle);
    }
    Ok(verdict)
}

fn finish(battle: &mut Battle, verdict: Verdict) {
    battle.status = BattleStatus::Ended;
    battle.active_unit_id = None;
    for u in &mut battle.units {
        u.has_started_action = false;
    }
    match verdict.winner {
        Some(w) => battle.push_log(format!("battle ended, winner {w}")),
        None => battle.push_log("battle ended in a draw"),
    }
}
