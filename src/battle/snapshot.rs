//! Serializable per-battle snapshot handed to the durable store when no
//! session holds the battle in memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::battle::types::Battle;

/// Key = `battle:<battle_id>:snap` (JSON). Contains the whole aggregate:
/// turn order, resources and conditions resume exactly as they were.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BattleSnapshot {
    pub battle: Battle,
    pub saved_at: DateTime<Utc>,
}

impl BattleSnapshot {
    pub fn capture(battle: &Battle) -> Self {
        BattleSnapshot {
            battle: battle.clone(),
            saved_at: Utc::now(),
        }
    }
}
