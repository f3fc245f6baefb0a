//! Deterministic combat math. Pure functions; the executor owns all state.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::battle::types::GridTopology;

/// Dodge chance gained per point of speed.
pub const DODGE_PER_SPEED: f32 = 0.05;
/// Ceiling on any dodge chance.
pub const MAX_DODGE: f32 = 0.75;
/// A corpse is cleared by any single hit dealing at least this much.
pub const CORPSE_CLEAR_DAMAGE: u32 = 3;

pub fn chebyshev(ax: i32, ay: i32, bx: i32, by: i32) -> u32 {
    (ax - bx).abs().max((ay - by).abs()) as u32
}

pub fn manhattan(ax: i32, ay: i32, bx: i32, by: i32) -> u32 {
    ((ax - bx).abs() + (ay - by).abs()) as u32
}

/// Exact movement cost between two cells under the battle's topology.
pub fn move_cost(ax: i32, ay: i32, bx: i32, by: i32, topology: GridTopology) -> u32 {
    match topology {
        GridTopology::FourWay => manhattan(ax, ay, bx, by),
        GridTopology::EightWay => chebyshev(ax, ay, bx, by),
    }
}

/// Melee reach shared by every attack target kind.
pub fn adjacent(ax: i32, ay: i32, bx: i32, by: i32) -> bool {
    chebyshev(ax, ay, bx, by) == 1
}

pub fn raw_damage(attack: u32, bonus: u32) -> u32 {
    attack.max(1) + bonus
}

pub fn dodge_chance(speed: u32, delta: f32) -> f32 {
    (speed as f32 * DODGE_PER_SPEED + delta).clamp(0.0, MAX_DODGE)
}

pub fn roll_dodge<R: Rng + ?Sized>(rng: &mut R, chance: f32) -> bool {
    rng.random::<f32>() < chance
}

/// Damage split after flat reduction and one protection pool.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct HitResolution {
    pub raw: u32,
    /// Damage left after flat reduction.
    pub reduced: u32,
    /// Portion soaked by the matching protection pool.
    pub absorbed: u32,
    /// Remainder that reaches HP.
    pub hp_damage: u32,
}

/// Protection-before-HP: the matching pool soaks first, only the remainder
/// reduces HP. Never drives the pool negative.
pub fn resolve_hit(raw: u32, reduction: u32, pool_current: u32) -> HitResolution {
    let reduced = raw.saturating_sub(reduction);
    let absorbed = reduced.min(pool_current);
    HitResolution {
        raw,
        reduced,
        absorbed,
        hp_damage: reduced - absorbed,
    }
}
