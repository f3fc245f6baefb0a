//! Process-wide routing tables. The only global state in the server:
//! battle → session sender, player → battle, and setups awaiting their
//! first connection. Entries are inserted on join/create and removed when
//! the battle ends or is parked.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{battle::types::BattleSetup, protocol::ClientMsg};

/// battle_id → live session inbox.
static SESSIONS: Lazy<DashMap<Uuid, mpsc::Sender<ClientMsg>>> = Lazy::new(DashMap::new);

/// player_id → battle_id, for request routing and rejoin lookups.
static PLAYER_BATTLES: Lazy<DashMap<Uuid, Uuid>> = Lazy::new(DashMap::new);

/// Battles created over HTTP that no session has picked up yet.
static PENDING_SETUPS: Lazy<DashMap<Uuid, BattleSetup>> = Lazy::new(DashMap::new);

pub fn register_session(battle_id: Uuid, tx: mpsc::Sender<ClientMsg>) {
    SESSIONS.insert(battle_id, tx);
}

pub fn session_sender(battle_id: Uuid) -> Option<mpsc::Sender<ClientMsg>> {
    SESSIONS.get(&battle_id).map(|e| e.value().clone())
}

pub fn remove_session(battle_id: Uuid) {
    SESSIONS.remove(&battle_id);
}

pub fn bind_player(player_id: Uuid, battle_id: Uuid) {
    PLAYER_BATTLES.insert(player_id, battle_id);
}

pub fn player_battle(player_id: Uuid) -> Option<Uuid> {
    PLAYER_BATTLES.get(&player_id).map(|e| *e.value())
}

/// Drop every player binding pointing at `battle_id`.
pub fn unbind_battle_players(battle_id: Uuid) {
    PLAYER_BATTLES.retain(|_, b| *b != battle_id);
}

pub fn register_setup(setup: BattleSetup) {
    PENDING_SETUPS.insert(setup.battle_id, setup);
}

pub fn take_setup(battle_id: Uuid) -> Option<BattleSetup> {
    PENDING_SETUPS.remove(&battle_id).map(|(_, s)| s)
}

pub fn setup_pending(battle_id: Uuid) -> bool {
    PENDING_SETUPS.contains_key(&battle_id)
}
