use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::battle::conditions::Condition;

/// Battle life-cycle.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum BattleStatus {
    Waiting,
    Active,
    Ended,
}

/// Exhaustion policy. `Arena` lets a maxed-out unit keep acting at an HP
/// cost; `Field` ends the battle by HP comparison once everyone is spent.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum BattleMode {
    Arena,
    Field,
}

/// Movement metric of the grid.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum GridTopology {
    FourWay,
    EightWay,
}

/// The four verbs a unit may be capable of.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Move,
    Attack,
    Dash,
    Dodge,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum DamageKind {
    Physical,
    Magical,
}

/// Three unit archetypes; the category decides the exhaustion ceiling.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum UnitCategory {
    Footman,
    Raider,
    Champion,
}

/// Combat stats of a unit.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct UnitStats {
    pub attack: u32,
    pub speed: u32,
    pub focus: u32,
    pub armor: u32,
    pub vitality: u32,
    pub damage_reduction: u32,
    pub damage_kind: DamageKind,
}

impl UnitCategory {
    pub fn stats(self) -> UnitStats {
        match self {
            UnitCategory::Footman => UnitStats {
                attack: 4,
                speed: 3,
                focus: 1,
                armor: 3,
                vitality: 12,
                damage_reduction: 1,
                damage_kind: DamageKind::Physical,
            },
            UnitCategory::Raider => UnitStats {
                attack: 3,
                speed: 5,
                focus: 4,
                armor: 1,
                vitality: 9,
                damage_reduction: 0,
                damage_kind: DamageKind::Magical,
            },
            UnitCategory::Champion => UnitStats {
                attack: 6,
                speed: 2,
                focus: 2,
                armor: 5,
                vitality: 16,
                damage_reduction: 2,
                damage_kind: DamageKind::Physical,
            },
        }
    }

    /// Action marks a unit of this category may accumulate before it is
    /// considered exhausted.
    pub fn max_marks(self) -> u32 {
        match self {
            UnitCategory::Footman => 3,
            UnitCategory::Raider => 4,
            UnitCategory::Champion => 2,
        }
    }
}

/// A damage-absorbing buffer consumed before HP.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct ProtectionPool {
    pub current: u32,
    pub max: u32,
}

impl ProtectionPool {
    pub fn full(max: u32) -> Self {
        ProtectionPool { current: max, max }
    }
}

/// One unit on the battlefield.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Unit {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub category: UnitCategory,
    pub x: i32,
    pub y: i32,
    pub stats: UnitStats,

    // Turn-scoped resources, reset when the unit's turn begins.
    pub moves_left: u32,
    pub actions_left: u32,
    pub attacks_left_this_turn: u32,

    pub phys_pool: ProtectionPool,
    pub magic_pool: ProtectionPool,
    pub hp: u32,
    pub hp_max: u32,
    pub is_alive: bool,
    pub action_marks: u32,
    pub has_started_action: bool,

    /// Ordered, duplicate-free set of active status tags.
    pub conditions: Vec<Condition>,
    pub allowed_actions: Vec<ActionKind>,
}

impl Unit {
    pub fn spawn(owner_id: Uuid, category: UnitCategory, x: i32, y: i32) -> Self {
        let stats = category.stats();
        Unit {
            id: Uuid::new_v4(),
            owner_id,
            category,
            x,
            y,
            stats,
            moves_left: 0,
            actions_left: 0,
            attacks_left_this_turn: 0,
            phys_pool: ProtectionPool::full(stats.armor),
            magic_pool: ProtectionPool::full(stats.focus),
            hp: stats.vitality,
            hp_max: stats.vitality,
            is_alive: true,
            action_marks: 0,
            has_started_action: false,
            conditions: Vec::new(),
            allowed_actions: vec![
                ActionKind::Move,
                ActionKind::Attack,
                ActionKind::Dash,
                ActionKind::Dodge,
            ],
        }
    }

    pub fn can(&self, kind: ActionKind) -> bool {
        self.allowed_actions.contains(&kind)
    }

    pub fn has_condition(&self, c: Condition) -> bool {
        self.conditions.contains(&c)
    }

    /// Insert preserving order, rejecting duplicates.
    pub fn add_condition(&mut self, c: Condition) {
        if !self.conditions.contains(&c) {
            self.conditions.push(c);
        }
    }

    pub fn remove_conditions(&mut self, expiring: &[Condition]) {
        self.conditions.retain(|c| !expiring.contains(c));
    }

    /// A defeated unit keeps blocking its cell until its remains are cleared.
    pub fn is_blocking_corpse(&self) -> bool {
        !self.is_alive && !self.has_condition(Condition::Cleared)
    }
}

/// One participant. Never removed mid-battle; only the whole aggregate goes.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Player {
    pub id: Uuid,
    pub kingdom_id: Option<Uuid>,
    pub color: String,
    pub is_connected: bool,
    pub is_bot: bool,
    pub surrendered: bool,
    /// Unit-turns ended this round; reset on round rollover.
    pub acted_this_round: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Obstacle {
    pub id: Uuid,
    pub x: i32,
    pub y: i32,
    pub hp: u32,
    pub destroyed: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogEntry {
    pub ts: DateTime<Utc>,
    pub round: u32,
    pub text: String,
}

/// Roster entry supplied at creation time.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RosterEntry {
    pub player_id: Uuid,
    pub kingdom_id: Option<Uuid>,
    pub is_bot: bool,
}

/// Everything needed to build a fresh battle.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BattleSetup {
    pub battle_id: Uuid,
    pub lobby_id: Uuid,
    pub mode: BattleMode,
    pub topology: GridTopology,
    pub width: i32,
    pub height: i32,
    pub roster: Vec<RosterEntry>,
    pub units_per_player: u32,
    pub obstacle_count: u32,
}

const PLAYER_COLORS: [&str; 6] = [
    "#d64545", "#3b82d6", "#3fa34d", "#c9a227", "#8e44ad", "#d67c3b",
];

/// Aggregate root. Owned exclusively by the turn machine running inside the
/// battle's session task; everything else reads broadcasts.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Battle {
    pub id: Uuid,
    pub lobby_id: Uuid,
    pub status: BattleStatus,
    pub mode: BattleMode,
    pub topology: GridTopology,
    pub width: i32,
    pub height: i32,
    pub round: u32,
    pub action_order: Vec<Uuid>,
    pub current_turn_index: usize,
    pub active_unit_id: Option<Uuid>,
    pub turn_seconds_left: u64,
    pub obstacles: Vec<Obstacle>,
    pub units: Vec<Unit>,
    pub players: Vec<Player>,
    pub log: Vec<LogEntry>,
}

impl Battle {
    pub fn new(setup: &BattleSetup) -> Self {
        let players = setup
            .roster
            .iter()
            .enumerate()
            .map(|(i, r)| Player {
                id: r.player_id,
                kingdom_id: r.kingdom_id,
                color: PLAYER_COLORS[i % PLAYER_COLORS.len()].to_string(),
                is_connected: false,
                is_bot: r.is_bot,
                surrendered: false,
                acted_this_round: 0,
            })
            .collect::<Vec<_>>();

        Battle {
            id: setup.battle_id,
            lobby_id: setup.lobby_id,
            status: BattleStatus::Waiting,
            mode: setup.mode,
            topology: setup.topology,
            width: setup.width,
            height: setup.height,
            round: 1,
            action_order: players.iter().map(|p| p.id).collect(),
            current_turn_index: 0,
            active_unit_id: None,
            turn_seconds_left: 0,
            obstacles: Vec::new(),
            units: Vec::new(),
            players,
            log: Vec::new(),
        }
    }

    pub fn unit(&self, id: Uuid) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == id)
    }

    pub fn unit_mut(&mut self, id: Uuid) -> Option<&mut Unit> {
        self.units.iter_mut().find(|u| u.id == id)
    }

    pub fn obstacle(&self, id: Uuid) -> Option<&Obstacle> {
        self.obstacles.iter().find(|o| o.id == id)
    }

    pub fn obstacle_mut(&mut self, id: Uuid) -> Option<&mut Obstacle> {
        self.obstacles.iter_mut().find(|o| o.id == id)
    }

    pub fn player(&self, id: Uuid) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: Uuid) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// Player whose unit may act right now.
    pub fn current_player_id(&self) -> Option<Uuid> {
        self.action_order.get(self.current_turn_index).copied()
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    /// A cell is free when no living unit, blocking corpse or intact
    /// obstacle occupies it.
    pub fn cell_free(&self, x: i32, y: i32) -> bool {
        let unit_blocks = self
            .units
            .iter()
            .any(|u| u.x == x && u.y == y && (u.is_alive || u.is_blocking_corpse()));
        let obstacle_blocks = self
            .obstacles
            .iter()
            .any(|o| o.x == x && o.y == y && !o.destroyed);
        !unit_blocks && !obstacle_blocks
    }

    pub fn living_units_of(&self, owner_id: Uuid) -> impl Iterator<Item = &Unit> {
        self.units
            .iter()
            .filter(move |u| u.owner_id == owner_id && u.is_alive)
    }

    /// Distinct owners that still field at least one living unit.
    pub fn living_owners(&self) -> Vec<Uuid> {
        let mut owners: Vec<Uuid> = Vec::new();
        for u in self.units.iter().filter(|u| u.is_alive) {
            if !owners.contains(&u.owner_id) {
                owners.push(u.owner_id);
            }
        }
        owners
    }

    pub fn push_log(&mut self, text: impl Into<String>) {
        let entry = LogEntry {
            ts: Utc::now(),
            round: self.round,
            text: text.into(),
        };
        self.log.push(entry);
    }
}
