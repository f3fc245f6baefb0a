//! Boundary for externally-chosen bot actions. The decision source picks;
//! the engine validates and executes exactly as it would for a human.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::ClientMsg;

/// One decision handed over by an external decision source.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type")]
pub enum AiDecision {
    Move {
        unit_id: Uuid,
        x: i32,
        y: i32,
    },
    Attack {
        unit_id: Uuid,
        target_id: Uuid,
    },
    /// Reserved for future skill actions; currently resolves as a pass so a
    /// bot turn can never wedge.
    Skill {
        unit_id: Uuid,
        skill: String,
        target_id: Option<Uuid>,
    },
    Pass,
}

/// Translate a decision into the ordinary wire request a human session
/// would have sent.
pub fn decision_request(
    battle_id: Uuid,
    player_id: Uuid,
    acting_unit: Uuid,
    decision: AiDecision,
) -> ClientMsg {
    match decision {
        AiDecision::Move { unit_id, x, y } => ClientMsg::Move {
            battle_id,
            player_id,
            unit_id,
            x,
            y,
        },
        AiDecision::Attack { unit_id, target_id } => ClientMsg::Attack {
            battle_id,
            player_id,
            unit_id,
            target_id,
        },
        AiDecision::Skill { unit_id, .. } => ClientMsg::EndTurn {
            battle_id,
            player_id,
            unit_id,
        },
        AiDecision::Pass => ClientMsg::EndTurn {
            battle_id,
            player_id,
            unit_id: acting_unit,
        },
    }
}
