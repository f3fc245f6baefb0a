//! Status-condition semantics. The single place where tags are interpreted;
//! the executor and turn machine only look at the reports returned here.

use serde::{Deserialize, Serialize};

use crate::battle::types::ActionKind;

/// Closed set of status tags a unit may carry.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Cannot act at all this turn.
    Stunned,
    /// Cannot move or dash this turn.
    Rooted,
    /// Next attack deals bonus damage.
    Enraged,
    /// Flat damage reduction while held.
    Shielded,
    /// Small permanent dodge bonus.
    Blessed,
    /// Grants one banked extra attack per turn.
    Frenzied,
    /// Takes damage at end of turn.
    Burning,
    /// Set by the dodge action; consumed by the next incoming attack.
    Dodging,
    /// Marks a defeated unit's remains as removed from the grid.
    Cleared,
}

/// Per-tag effect row. One row per variant, nothing interpreted elsewhere.
struct Effect {
    blocks: &'static [ActionKind],
    block_reason: &'static str,
    bonus_damage: u32,
    damage_reduction: u32,
    dodge_chance_delta: f32,
    extra_attacks: u32,
    expires_after_attack: bool,
    expires_on_incoming: bool,
    ends_with_turn: bool,
    burn_damage: u32,
}

const NO_EFFECT: Effect = Effect {
    blocks: &[],
    block_reason: "",
    bonus_damage: 0,
    damage_reduction: 0,
    dodge_chance_delta: 0.0,
    extra_attacks: 0,
    expires_after_attack: false,
    expires_on_incoming: false,
    ends_with_turn: false,
    burn_damage: 0,
};

fn effect(c: Condition) -> Effect {
    match c {
        Condition::Stunned => Effect {
            blocks: &[
                ActionKind::Move,
                ActionKind::Attack,
                ActionKind::Dash,
                ActionKind::Dodge,
            ],
            block_reason: "unit is stunned",
            ends_with_turn: true,
            ..NO_EFFECT
        },
        Condition::Rooted => Effect {
            blocks: &[ActionKind::Move, ActionKind::Dash],
            block_reason: "unit is rooted",
            ends_with_turn: true,
            ..NO_EFFECT
        },
        Condition::Enraged => Effect {
            bonus_damage: 2,
            expires_after_attack: true,
            ..NO_EFFECT
        },
        Condition::Shielded => Effect {
            damage_reduction: 2,
            ..NO_EFFECT
        },
        Condition::Blessed => Effect {
            dodge_chance_delta: 0.10,
            ..NO_EFFECT
        },
        Condition::Frenzied => Effect {
            extra_attacks: 1,
            ..NO_EFFECT
        },
        Condition::Burning => Effect {
            burn_damage: 1,
            ..NO_EFFECT
        },
        Condition::Dodging => Effect {
            dodge_chance_delta: 0.50,
            expires_on_incoming: true,
            ..NO_EFFECT
        },
        Condition::Cleared => NO_EFFECT,
    }
}

/// Numeric modifiers collected while scanning an action request.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Modifiers {
    pub bonus_damage: u32,
    pub damage_reduction: u32,
    pub dodge_chance_delta: f32,
    pub extra_attacks: u32,
}

/// Verdict for one requested action.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub can_perform: bool,
    pub block_reason: Option<&'static str>,
    pub modifiers: Modifiers,
    /// Tags to strip once the action has resolved.
    pub expiring: Vec<Condition>,
}

/// Defender-side view consulted by combat math on an incoming attack.
#[derive(Debug, Clone)]
pub struct DefenseReport {
    pub damage_reduction: u32,
    pub dodge_chance_delta: f32,
    /// Tags consumed by this incoming attack, hit or miss.
    pub expiring: Vec<Condition>,
}

/// End-of-turn decay for one unit.
#[derive(Debug, Clone)]
pub struct TurnDecay {
    pub damage: u32,
    pub expiring: Vec<Condition>,
}

/// Decide whether `kind` may be performed under `conditions` and with which
/// modifiers. Pure function of its inputs.
pub fn scan(conditions: &[Condition], kind: ActionKind) -> ScanReport {
    let mut report = ScanReport {
        can_perform: true,
        block_reason: None,
        modifiers: Modifiers::default(),
        expiring: Vec::new(),
    };

    for &c in conditions {
        let e = effect(c);
        if e.blocks.contains(&kind) && report.can_perform {
            report.can_perform = false;
            report.block_reason = Some(e.block_reason);
        }
        report.modifiers.bonus_damage += e.bonus_damage;
        report.modifiers.damage_reduction += e.damage_reduction;
        report.modifiers.dodge_chance_delta += e.dodge_chance_delta;
        report.modifiers.extra_attacks += e.extra_attacks;
        if e.expires_after_attack && kind == ActionKind::Attack {
            report.expiring.push(c);
        }
    }
    report
}

/// Defensive modifiers of the unit about to be hit.
pub fn incoming(conditions: &[Condition]) -> DefenseReport {
    let mut report = DefenseReport {
        damage_reduction: 0,
        dodge_chance_delta: 0.0,
        expiring: Vec::new(),
    };
    for &c in conditions {
        let e = effect(c);
        report.damage_reduction += e.damage_reduction;
        report.dodge_chance_delta += e.dodge_chance_delta;
        if e.expires_on_incoming {
            report.expiring.push(c);
        }
    }
    report
}

/// Burning damage and single-turn tag removal, applied when a unit's turn ends.
pub fn end_of_turn(conditions: &[Condition]) -> TurnDecay {
    let mut decay = TurnDecay {
        damage: 0,
        expiring: Vec::new(),
    };
    for &c in conditions {
        let e = effect(c);
        decay.damage += e.burn_damage;
        if e.ends_with_turn {
            decay.expiring.push(c);
        }
    }
    decay
}
