//! One entry point per action kind. Every call validates fully before the
//! first mutation; rule violations come back as values, never panics.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::battle::{
    combat::{self, HitResolution, CORPSE_CLEAR_DAMAGE},
    conditions::{self, Condition},
    types::{ActionKind, Battle, DamageKind},
};

/// Rule violations. Recoverable, surfaced to the requesting session only.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("unit not found")]
    UnknownUnit,
    #[error("unit is dead")]
    DeadUnit,
    #[error("unit has not begun its turn")]
    NotActing,
    #[error("unit cannot perform that action")]
    MissingCapability,
    #[error("{0}")]
    Blocked(&'static str),
    #[error("not enough movement: need {needed}, have {available}")]
    InsufficientMoves { needed: u32, available: u32 },
    #[error("no actions left this turn")]
    NoActionsLeft,
    #[error("destination out of bounds")]
    OutOfBounds,
    #[error("destination is occupied")]
    Occupied,
    #[error("target is out of reach")]
    OutOfReach,
    #[error("target not found")]
    UnknownTarget,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Unit,
    Corpse,
    Obstacle,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MoveOutcome {
    pub unit_id: Uuid,
    pub from: (i32, i32),
    pub to: (i32, i32),
    pub cost: u32,
    pub moves_left: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AttackOutcome {
    pub attacker_id: Uuid,
    pub target_id: Uuid,
    pub target_kind: TargetKind,
    pub dodged: bool,
    /// Absent when the attack was dodged.
    pub hit: Option<HitResolution>,
    pub target_hp: u32,
    pub target_destroyed: bool,
    pub consumed_banked_attack: bool,
    pub attacks_left_this_turn: u32,
    pub actions_left: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DashOutcome {
    pub unit_id: Uuid,
    pub gained: u32,
    pub moves_left: u32,
    pub actions_left: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DodgeOutcome {
    pub unit_id: Uuid,
    pub actions_left: u32,
}

/// Shared gate: the unit must exist, be alive, be mid-turn, have the
/// capability, and not be blocked by a condition. Returns the scan report
/// so callers reuse its modifiers and expiry list.
fn gate(
    battle: &Battle,
    unit_id: Uuid,
    kind: ActionKind,
) -> Result<conditions::ScanReport, ActionError> {
    let unit = battle.unit(unit_id).ok_or(ActionError::UnknownUnit)?;
    if !unit.is_alive {
        return Err(ActionError::DeadUnit);
    }
    if !unit.has_started_action {
        return Err(ActionError::NotActing);
    }
    if !unit.can(kind) {
        return Err(ActionError::MissingCapability);
    }
    let report = conditions::scan(&unit.conditions, kind);
    if !report.can_perform {
        return Err(ActionError::Blocked(
            report.block_reason.unwrap_or("action blocked"),
        ));
    }
    Ok(report)
}

pub fn execute_move(
    battle: &mut Battle,
    unit_id: Uuid,
    x: i32,
    y: i32,
) -> Result<MoveOutcome, ActionError> {
    let report = gate(battle, unit_id, ActionKind::Move)?;

    let unit = battle.unit(unit_id).expect("gated");
    let (from_x, from_y) = (unit.x, unit.y);
    let moves_left = unit.moves_left;

    if !battle.in_bounds(x, y) {
        return Err(ActionError::OutOfBounds);
    }
    if !battle.cell_free(x, y) {
        return Err(ActionError::Occupied);
    }
    let cost = combat::move_cost(from_x, from_y, x, y, battle.topology);
    if cost > moves_left {
        return Err(ActionError::InsufficientMoves {
            needed: cost,
            available: moves_left,
        });
    }

    let unit = battle.unit_mut(unit_id).expect("gated");
    unit.x = x;
    unit.y = y;
    unit.moves_left -= cost;
    unit.remove_conditions(&report.expiring);
    let moves_left = unit.moves_left;

    Ok(MoveOutcome {
        unit_id,
        from: (from_x, from_y),
        to: (x, y),
        cost,
        moves_left,
    })
}

pub fn execute_attack<R: Rng + ?Sized>(
    battle: &mut Battle,
    unit_id: Uuid,
    target_id: Uuid,
    rng: &mut R,
) -> Result<AttackOutcome, ActionError> {
    let report = gate(battle, unit_id, ActionKind::Attack)?;

    let attacker = battle.unit(unit_id).expect("gated");
    if attacker.attacks_left_this_turn == 0 && attacker.actions_left == 0 {
        return Err(ActionError::NoActionsLeft);
    }
    let (ax, ay) = (attacker.x, attacker.y);
    let attack_stat = attacker.stats.attack;
    let damage_kind = attacker.stats.damage_kind;

    // Resolve the target shape before touching anything.
    let (target_kind, tx, ty) = if let Some(t) = battle.unit(target_id) {
        if t.is_alive {
            (TargetKind::Unit, t.x, t.y)
        } else if t.is_blocking_corpse() {
            (TargetKind::Corpse, t.x, t.y)
        } else {
            return Err(ActionError::UnknownTarget);
        }
    } else if let Some(o) = battle.obstacle(target_id) {
        if o.destroyed {
            return Err(ActionError::UnknownTarget);
        }
        (TargetKind::Obstacle, o.x, o.y)
    } else {
        return Err(ActionError::UnknownTarget);
    };

    if !combat::adjacent(ax, ay, tx, ty) {
        return Err(ActionError::OutOfReach);
    }

    let raw = combat::raw_damage(attack_stat, report.modifiers.bonus_damage);

    // Kind-specific effect.
    let (dodged, hit, target_hp, target_destroyed) = match target_kind {
        TargetKind::Unit => {
            let defender = battle.unit(target_id).expect("resolved above");
            let defense = conditions::incoming(&defender.conditions);
            let chance =
                combat::dodge_chance(defender.stats.speed, defense.dodge_chance_delta);
            if combat::roll_dodge(rng, chance) {
                let defender = battle.unit_mut(target_id).expect("resolved above");
                defender.remove_conditions(&defense.expiring);
                let hp = defender.hp;
                (true, None, hp, false)
            } else {
                let reduction = defender.stats.damage_reduction + defense.damage_reduction;
                let pool_current = match damage_kind {
                    DamageKind::Physical => defender.phys_pool.current,
                    DamageKind::Magical => defender.magic_pool.current,
                };
                let res = combat::resolve_hit(raw, reduction, pool_current);

                let defender = battle.unit_mut(target_id).expect("resolved above");
                match damage_kind {
                    DamageKind::Physical => defender.phys_pool.current -= res.absorbed,
                    DamageKind::Magical => defender.magic_pool.current -= res.absorbed,
                }
                defender.hp = defender.hp.saturating_sub(res.hp_damage);
                let defeated = defender.hp == 0;
                if defeated {
                    defender.is_alive = false;
                }
                defender.remove_conditions(&defense.expiring);
                let hp = defender.hp;
                (false, Some(res), hp, defeated)
            }
        }
        TargetKind::Corpse => {
            // No pools, no HP tracking; one sufficient hit clears the remains.
            let cleared = raw >= CORPSE_CLEAR_DAMAGE;
            if cleared {
                let corpse = battle.unit_mut(target_id).expect("resolved above");
                corpse.add_condition(Condition::Cleared);
            }
            let res = HitResolution {
                raw,
                reduced: raw,
                absorbed: 0,
                hp_damage: 0,
            };
            (false, Some(res), 0, cleared)
        }
        TargetKind::Obstacle => {
            let obstacle = battle.obstacle_mut(target_id).expect("resolved above");
            obstacle.hp = obstacle.hp.saturating_sub(raw);
            if obstacle.hp == 0 {
                obstacle.destroyed = true;
            }
            let res = HitResolution {
                raw,
                reduced: raw,
                absorbed: 0,
                hp_damage: raw,
            };
            (false, Some(res), obstacle.hp, obstacle.hp == 0)
        }
    };

    // Banked attacks are spent before the action slot; spending the slot
    // seeds this turn's banked balance from the scanner.
    let attacker = battle.unit_mut(unit_id).expect("gated");
    let consumed_banked_attack = attacker.attacks_left_this_turn > 0;
    if consumed_banked_attack {
        attacker.attacks_left_this_turn -= 1;
    } else {
        attacker.actions_left -= 1;
        attacker.attacks_left_this_turn = report.modifiers.extra_attacks;
    }
    attacker.remove_conditions(&report.expiring);
    let attacks_left_this_turn = attacker.attacks_left_this_turn;
    let actions_left = attacker.actions_left;

    Ok(AttackOutcome {
        attacker_id: unit_id,
        target_id,
        target_kind,
        dodged,
        hit,
        target_hp,
        target_destroyed,
        consumed_banked_attack,
        attacks_left_this_turn,
        actions_left,
    })
}

pub fn execute_dash(battle: &mut Battle, unit_id: Uuid) -> Result<DashOutcome, ActionError> {
    let report = gate(battle, unit_id, ActionKind::Dash)?;

    let unit = battle.unit(unit_id).expect("gated");
    if unit.actions_left == 0 {
        return Err(ActionError::NoActionsLeft);
    }
    let gained = unit.stats.speed.max(1);

    let unit = battle.unit_mut(unit_id).expect("gated");
    unit.moves_left += gained;
    unit.actions_left -= 1;
    unit.remove_conditions(&report.expiring);

    Ok(DashOutcome {
        unit_id,
        gained,
        moves_left: unit.moves_left,
        actions_left: unit.actions_left,
    })
}

pub fn execute_dodge(battle: &mut Battle, unit_id: Uuid) -> Result<DodgeOutcome, ActionError> {
    let report = gate(battle, unit_id, ActionKind::Dodge)?;

    let unit = battle.unit(unit_id).expect("gated");
    if unit.actions_left == 0 {
        return Err(ActionError::NoActionsLeft);
    }

    let unit = battle.unit_mut(unit_id).expect("gated");
    unit.actions_left -= 1;
    unit.add_condition(Condition::Dodging);
    unit.remove_conditions(&report.expiring);

    Ok(DodgeOutcome {
        unit_id,
        actions_left: unit.actions_left,
    })
}
