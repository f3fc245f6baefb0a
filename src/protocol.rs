//! Wire-protocol shared by client, WS handler and battle session.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::battle::{
    actions::{AttackOutcome, DashOutcome, DodgeOutcome, MoveOutcome},
    turns::{EndReason, TurnResources},
    types::Battle,
};

// ---------- client → server ----------
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type")]
pub enum ClientMsg {
    Ready {
        battle_id: Uuid,
        player_id: Uuid,
    },
    /// Sent by a client that lost its socket and re-opened a new one.
    Resume {
        battle_id: Uuid,
        player_id: Uuid,
    },
    BeginTurn {
        battle_id: Uuid,
        player_id: Uuid,
        unit_id: Uuid,
    },
    Move {
        battle_id: Uuid,
        player_id: Uuid,
        unit_id: Uuid,
        x: i32,
        y: i32,
    },
    Attack {
        battle_id: Uuid,
        player_id: Uuid,
        unit_id: Uuid,
        target_id: Uuid,
    },
    Dash {
        battle_id: Uuid,
        player_id: Uuid,
        unit_id: Uuid,
    },
    Dodge {
        battle_id: Uuid,
        player_id: Uuid,
        unit_id: Uuid,
    },
    EndTurn {
        battle_id: Uuid,
        player_id: Uuid,
        unit_id: Uuid,
    },
    Surrender {
        battle_id: Uuid,
        player_id: Uuid,
    },
    /// Freeze the turn countdown while a blocking animation plays out.
    PauseTimer {
        battle_id: Uuid,
        player_id: Uuid,
    },
    ResumeTimer {
        battle_id: Uuid,
        player_id: Uuid,
    },
    /// Emitted internally by the WS layer when a socket closes.
    Disconnected {
        battle_id: Uuid,
        player_id: Uuid,
    },
}

impl ClientMsg {
    pub fn battle_id(&self) -> Uuid {
        match self {
            ClientMsg::Ready { battle_id, .. }
            | ClientMsg::Resume { battle_id, .. }
            | ClientMsg::BeginTurn { battle_id, .. }
            | ClientMsg::Move { battle_id, .. }
            | ClientMsg::Attack { battle_id, .. }
            | ClientMsg::Dash { battle_id, .. }
            | ClientMsg::Dodge { battle_id, .. }
            | ClientMsg::EndTurn { battle_id, .. }
            | ClientMsg::Surrender { battle_id, .. }
            | ClientMsg::PauseTimer { battle_id, .. }
            | ClientMsg::ResumeTimer { battle_id, .. }
            | ClientMsg::Disconnected { battle_id, .. } => *battle_id,
        }
    }

    pub fn player_id(&self) -> Uuid {
        match self {
            ClientMsg::Ready { player_id, .. }
            | ClientMsg::Resume { player_id, .. }
            | ClientMsg::BeginTurn { player_id, .. }
            | ClientMsg::Move { player_id, .. }
            | ClientMsg::Attack { player_id, .. }
            | ClientMsg::Dash { player_id, .. }
            | ClientMsg::Dodge { player_id, .. }
            | ClientMsg::EndTurn { player_id, .. }
            | ClientMsg::Surrender { player_id, .. }
            | ClientMsg::PauseTimer { player_id, .. }
            | ClientMsg::ResumeTimer { player_id, .. }
            | ClientMsg::Disconnected { player_id, .. } => *player_id,
        }
    }
}

// ---------- server → client ----------
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type")]
pub enum ServerMsg {
    /// Full state sync: sent to everyone on start and to a single resuming
    /// client so its view catches up.
    BattleStart {
        battle_id: Uuid,
        battle: Box<Battle>,
    },
    /// Requester-only; no broadcast ever goes out for a rejected action.
    Rejected {
        battle_id: Uuid,
        reason: String,
    },
    TurnBegan {
        battle_id: Uuid,
        player_id: Uuid,
        unit_id: Uuid,
        resources: TurnResources,
    },
    UnitMoved {
        battle_id: Uuid,
        outcome: MoveOutcome,
    },
    UnitAttacked {
        battle_id: Uuid,
        outcome: AttackOutcome,
    },
    UnitDefeated {
        battle_id: Uuid,
        unit_id: Uuid,
        owner_id: Uuid,
    },
    DashApplied {
        battle_id: Uuid,
        outcome: DashOutcome,
    },
    DodgeApplied {
        battle_id: Uuid,
        outcome: DodgeOutcome,
    },
    TurnTimer {
        battle_id: Uuid,
        seconds_remaining: u64,
        active_player_id: Uuid,
    },
    TimerPaused {
        battle_id: Uuid,
        seconds_remaining: u64,
    },
    TimerResumed {
        battle_id: Uuid,
        seconds_remaining: u64,
    },
    NextPlayer {
        battle_id: Uuid,
        player_id: Uuid,
        /// True when the previous turn was ended by the countdown, not the
        /// player. The only way observers can tell the two apart.
        forced: bool,
    },
    NewRound {
        battle_id: Uuid,
        round: u32,
    },
    BattleEnded {
        battle_id: Uuid,
        winner_id: Option<Uuid>,
        reason: EndReason,
    },
    PlayerDisconnected {
        battle_id: Uuid,
        player_id: Uuid,
    },
    PlayerReconnected {
        battle_id: Uuid,
        player_id: Uuid,
    },
}
