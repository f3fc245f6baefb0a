//! One async task per live battle. All events for a battle — action
//! requests, the countdown, disconnect notices — drain through a single
//! mpsc queue, so state transitions are applied strictly in arrival order
//! and the turn machine never needs a lock.
//!
//! ✔ resume after disconnect (loads the parked snapshot if found)
//! ✔ grace-period auto-surrender
//! ✔ pausable turn countdown
//! ✔ all-humans-gone handoff to the durable store

use std::collections::HashMap;
use std::sync::Arc;

use redis::{AsyncCommands, Client as RedisClient};
use tokio::{
    sync::mpsc,
    time::{interval, Duration, Instant},
};
use uuid::Uuid;

use crate::{
    battle::{
        actions,
        snapshot::BattleSnapshot,
        turns::{self, EndReason, EndTurnOutcome},
        types::{Battle, BattleStatus},
    },
    config::settings,
    protocol::{ClientMsg, ServerMsg},
    registry,
    store::SnapshotStore,
};

#[derive(Debug)]
pub enum DispatchErr {
    ChannelClosed,
}

/// Route one inbound message to its battle's session, spawning the session
/// first if the battle is not in memory (fresh setup or parked snapshot).
pub async fn dispatch(redis: RedisClient, msg: ClientMsg) -> Result<(), DispatchErr> {
    let battle_id = msg.battle_id();

    // Fast path - already running
    if let Some(tx) = registry::session_sender(battle_id) {
        return tx.send(msg).await.map_err(|_| DispatchErr::ChannelClosed);
    }

    let (tx, rx) = mpsc::channel::<ClientMsg>(64);
    tx.send(msg).await.map_err(|_| DispatchErr::ChannelClosed)?;
    registry::register_session(battle_id, tx);
    crate::metrics::BATTLES_LIVE.inc();

    tokio::spawn(run_session(battle_id, redis, rx));
    Ok(())
}

async fn run_session(battle_id: Uuid, redis: RedisClient, mut rx: mpsc::Receiver<ClientMsg>) {
    let store = SnapshotStore::new(redis.clone(), settings().snapshot_ttl);

    // Parked battles resume exactly where they stopped; otherwise a pending
    // setup from the creation endpoint seeds a fresh aggregate.
    let battle = match store.load(battle_id).await {
        Ok(Some(snap)) => {
            log::info!(
                "battle {battle_id} restored from snapshot (round {})",
                snap.battle.round
            );
            Some(snap.battle)
        }
        Ok(None) => registry::take_setup(battle_id).map(|setup| Battle::new(&setup)),
        Err(e) => {
            log::warn!("snapshot load failed for {battle_id}: {e:?}");
            registry::take_setup(battle_id).map(|setup| Battle::new(&setup))
        }
    };
    let Some(battle) = battle else {
        log::warn!("dropping messages for unknown battle {battle_id}");
        registry::remove_session(battle_id);
        crate::metrics::BATTLES_LIVE.dec();
        return;
    };

    let mut session = Session {
        battle,
        redis: Arc::new(redis),
        store,
        timer_paused: false,
        dc_since: HashMap::new(),
        abandon_since: None,
    };

    // A persistent ticker, so a busy inbox cannot starve the countdown.
    let mut ticker = interval(Duration::from_secs(1));
    ticker.tick().await; // the first tick completes immediately

    loop {
        let keep_running = tokio::select! {
            maybe = rx.recv() => match maybe {
                Some(msg) => session.handle(msg).await,
                None => false,
            },
            _ = ticker.tick() => session.tick().await,
        };
        if !keep_running {
            break;
        }
    }
    registry::remove_session(battle_id);
    crate::metrics::BATTLES_LIVE.dec();
}

struct Session {
    battle: Battle,
    redis: Arc<RedisClient>,
    store: SnapshotStore,
    timer_paused: bool,
    /// When each disconnected player's grace window opened.
    dc_since: HashMap<Uuid, Instant>,
    /// Set while no human is connected; drives the persistence handoff.
    abandon_since: Option<Instant>,
}

impl Session {
    // ---- pub/sub helpers ------------------------------------------------

    fn publish(&self, channel: String, msg: &ServerMsg) {
        let rc = self.redis.clone();
        if let Ok(json) = serde_json::to_string(msg) {
            tokio::spawn(async move {
                if let Ok(mut c) = rc.get_multiplexed_async_connection().await {
                    let _: () = c.publish(channel, json).await.unwrap_or(());
                }
            });
        }
    }

    /// Fan-out to every session attached to the battle.
    fn broadcast(&self, msg: &ServerMsg) {
        self.publish(format!("battle:{}:events", self.battle.id), msg);
    }

    /// Requester-only reply; rejections never reach the other clients.
    fn reply(&self, player_id: Uuid, msg: &ServerMsg) {
        self.publish(format!("player:{player_id}:events"), msg);
    }

    fn reject(&self, player_id: Uuid, reason: impl ToString) {
        self.reply(
            player_id,
            &ServerMsg::Rejected {
                battle_id: self.battle.id,
                reason: reason.to_string(),
            },
        );
    }

    // ---- inbound events -------------------------------------------------

    async fn handle(&mut self, msg: ClientMsg) -> bool {
        match msg {
            ClientMsg::Ready { player_id, .. } => self.connect(player_id, false),
            ClientMsg::Resume { player_id, .. } => self.connect(player_id, true),
            ClientMsg::Disconnected { player_id, .. } => self.disconnect(player_id),
            ClientMsg::BeginTurn {
                player_id, unit_id, ..
            } => self.begin_turn(player_id, unit_id),
            ClientMsg::Move {
                player_id,
                unit_id,
                x,
                y,
                ..
            } => self.do_move(player_id, unit_id, x, y),
            ClientMsg::Attack {
                player_id,
                unit_id,
                target_id,
                ..
            } => return self.do_attack(player_id, unit_id, target_id).await,
            ClientMsg::Dash {
                player_id, unit_id, ..
            } => self.do_dash(player_id, unit_id),
            ClientMsg::Dodge {
                player_id, unit_id, ..
            } => self.do_dodge(player_id, unit_id),
            ClientMsg::EndTurn {
                player_id, unit_id, ..
            } => return self.end_turn(player_id, unit_id).await,
            ClientMsg::Surrender { player_id, .. } => {
                return self.surrender(player_id, EndReason::Surrender).await
            }
            ClientMsg::PauseTimer { player_id, .. } => self.pause_timer(player_id, true),
            ClientMsg::ResumeTimer { player_id, .. } => self.pause_timer(player_id, false),
        }
        true
    }

    fn connect(&mut self, player_id: Uuid, resync: bool) {
        let battle_id = self.battle.id;
        let Some(player) = self.battle.player_mut(player_id) else {
            self.reject(player_id, "player not in this battle");
            return;
        };
        let was_connected = player.is_connected;
        player.is_connected = true;
        self.dc_since.remove(&player_id);
        self.abandon_since = None;
        registry::bind_player(player_id, battle_id);

        if !was_connected && self.battle.status == BattleStatus::Active {
            self.broadcast(&ServerMsg::PlayerReconnected {
                battle_id,
                player_id,
            });
        }
        if resync {
            self.reply(
                player_id,
                &ServerMsg::BattleStart {
                    battle_id,
                    battle: Box::new(self.battle.clone()),
                },
            );
        }

        // Everyone human is here: leave the waiting room.
        let all_ready = self
            .battle
            .players
            .iter()
            .all(|p| p.is_bot || p.is_connected);
        if self.battle.status == BattleStatus::Waiting && all_ready {
            turns::start_battle(
                &mut self.battle,
                settings().units_per_player,
                settings().obstacle_count,
                &mut rand::rng(),
            );
            self.battle.turn_seconds_left = settings().turn_seconds;
            self.timer_paused = false;
            self.broadcast(&ServerMsg::BattleStart {
                battle_id,
                battle: Box::new(self.battle.clone()),
            });
            self.broadcast_timer();
        }
    }

    fn disconnect(&mut self, player_id: Uuid) {
        let battle_id = self.battle.id;
        let Some(player) = self.battle.player_mut(player_id) else {
            return;
        };
        if !player.is_connected {
            return;
        }
        player.is_connected = false;
        let is_bot = player.is_bot;
        if !is_bot {
            self.dc_since.insert(player_id, Instant::now());
        }
        self.broadcast(&ServerMsg::PlayerDisconnected {
            battle_id,
            player_id,
        });

        let any_human_connected = self
            .battle
            .players
            .iter()
            .any(|p| !p.is_bot && p.is_connected);
        if !any_human_connected {
            self.abandon_since = Some(Instant::now());
        }
    }

    fn begin_turn(&mut self, player_id: Uuid, unit_id: Uuid) {
        match turns::begin_turn(&mut self.battle, player_id, unit_id) {
            Ok(resources) => self.broadcast(&ServerMsg::TurnBegan {
                battle_id: self.battle.id,
                player_id,
                unit_id,
                resources,
            }),
            Err(e) => self.reject(player_id, e),
        }
    }

    /// Mid-turn actions must come from the acting player for the acting
    /// unit; everything else is a stale or spoofed request.
    fn authorize(&self, player_id: Uuid, unit_id: Uuid) -> Result<(), &'static str> {
        if self.battle.status != BattleStatus::Active {
            return Err("battle is not active");
        }
        if self.battle.current_player_id() != Some(player_id) {
            return Err("not your turn");
        }
        if self.battle.active_unit_id != Some(unit_id) {
            return Err("that unit is not the acting unit");
        }
        Ok(())
    }

    fn do_move(&mut self, player_id: Uuid, unit_id: Uuid, x: i32, y: i32) {
        if let Err(reason) = self.authorize(player_id, unit_id) {
            self.reject(player_id, reason);
            return;
        }
        match actions::execute_move(&mut self.battle, unit_id, x, y) {
            Ok(outcome) => self.broadcast(&ServerMsg::UnitMoved {
                battle_id: self.battle.id,
                outcome,
            }),
            Err(e) => self.reject(player_id, e),
        }
    }

    async fn do_attack(&mut self, player_id: Uuid, unit_id: Uuid, target_id: Uuid) -> bool {
        if let Err(reason) = self.authorize(player_id, unit_id) {
            self.reject(player_id, reason);
            return true;
        }
        let outcome =
            match actions::execute_attack(&mut self.battle, unit_id, target_id, &mut rand::rng())
            {
                Ok(o) => o,
                Err(e) => {
                    self.reject(player_id, e);
                    return true;
                }
            };
        let battle_id = self.battle.id;
        let unit_down =
            outcome.target_kind == actions::TargetKind::Unit && outcome.target_destroyed;
        self.broadcast(&ServerMsg::UnitAttacked { battle_id, outcome });

        if unit_down {
            if let Some(owner_id) = self.battle.unit(target_id).map(|u| u.owner_id) {
                self.broadcast(&ServerMsg::UnitDefeated {
                    battle_id,
                    unit_id: target_id,
                    owner_id,
                });
            }
            if let Some(verdict) = turns::resolve_defeat(&mut self.battle) {
                return self.finish(verdict.winner, verdict.reason).await;
            }
        }
        true
    }

    fn do_dash(&mut self, player_id: Uuid, unit_id: Uuid) {
        if let Err(reason) = self.authorize(player_id, unit_id) {
            self.reject(player_id, reason);
            return;
        }
        match actions::execute_dash(&mut self.battle, unit_id) {
            Ok(outcome) => self.broadcast(&ServerMsg::DashApplied {
                battle_id: self.battle.id,
                outcome,
            }),
            Err(e) => self.reject(player_id, e),
        }
    }

    fn do_dodge(&mut self, player_id: Uuid, unit_id: Uuid) {
        if let Err(reason) = self.authorize(player_id, unit_id) {
            self.reject(player_id, reason);
            return;
        }
        match actions::execute_dodge(&mut self.battle, unit_id) {
            Ok(outcome) => self.broadcast(&ServerMsg::DodgeApplied {
                battle_id: self.battle.id,
                outcome,
            }),
            Err(e) => self.reject(player_id, e),
        }
    }

    async fn end_turn(&mut self, player_id: Uuid, unit_id: Uuid) -> bool {
        match turns::end_turn(&mut self.battle, player_id, unit_id) {
            Ok(outcome) => self.after_handover(outcome).await,
            Err(e) => {
                self.reject(player_id, e);
                true
            }
        }
    }

    /// Broadcast everything a turn handover produced and rearm the countdown.
    async fn after_handover(&mut self, outcome: EndTurnOutcome) -> bool {
        let battle_id = self.battle.id;
        if outcome.unit_defeated_by_decay {
            if let Some(unit_id) = outcome.ended_unit {
                if let Some(owner_id) = self.battle.unit(unit_id).map(|u| u.owner_id) {
                    self.broadcast(&ServerMsg::UnitDefeated {
                        battle_id,
                        unit_id,
                        owner_id,
                    });
                }
            }
        }
        if let Some(verdict) = outcome.verdict {
            return self.finish(verdict.winner, verdict.reason).await;
        }
        if let Some(player_id) = outcome.next_player {
            self.broadcast(&ServerMsg::NextPlayer {
                battle_id,
                player_id,
                forced: outcome.forced,
            });
        }
        if let Some(round) = outcome.new_round {
            self.broadcast(&ServerMsg::NewRound { battle_id, round });
        }
        self.battle.turn_seconds_left = settings().turn_seconds;
        self.timer_paused = false;
        self.broadcast_timer();
        true
    }

    async fn surrender(&mut self, player_id: Uuid, reason: EndReason) -> bool {
        let before = self.battle.current_player_id();
        match turns::surrender(&mut self.battle, player_id, reason) {
            Ok(Some(verdict)) => self.finish(verdict.winner, verdict.reason).await,
            Ok(None) => {
                // More than one side still standing; just hand the turn on
                // if it belonged to the leaver.
                let current = self.battle.current_player_id();
                if current != before {
                    if let Some(next) = current {
                        self.broadcast(&ServerMsg::NextPlayer {
                            battle_id: self.battle.id,
                            player_id: next,
                            forced: true,
                        });
                    }
                    self.battle.turn_seconds_left = settings().turn_seconds;
                    self.broadcast_timer();
                }
                true
            }
            Err(e) => {
                self.reject(player_id, e);
                true
            }
        }
    }

    fn pause_timer(&mut self, player_id: Uuid, pause: bool) {
        if self.battle.status != BattleStatus::Active {
            self.reject(player_id, "battle is not active");
            return;
        }
        if self.battle.current_player_id() != Some(player_id) {
            self.reject(player_id, "not your turn");
            return;
        }
        self.timer_paused = pause;
        let battle_id = self.battle.id;
        let seconds_remaining = self.battle.turn_seconds_left;
        if pause {
            self.broadcast(&ServerMsg::TimerPaused {
                battle_id,
                seconds_remaining,
            });
        } else {
            // Resumes with the remaining value, never a fresh countdown.
            self.broadcast(&ServerMsg::TimerResumed {
                battle_id,
                seconds_remaining,
            });
        }
    }

    fn broadcast_timer(&self) {
        if let Some(active_player_id) = self.battle.current_player_id() {
            self.broadcast(&ServerMsg::TurnTimer {
                battle_id: self.battle.id,
                seconds_remaining: self.battle.turn_seconds_left,
                active_player_id,
            });
        }
    }

    // ---- 1-second house-keeping tick ------------------------------------

    async fn tick(&mut self) -> bool {
        // Turn countdown. The tick re-reads battle state, so a countdown
        // that lost the race against a client end_turn finds the fresh
        // turn's full budget and simply keeps counting it down.
        if self.battle.status == BattleStatus::Active && !self.timer_paused {
            self.battle.turn_seconds_left = self.battle.turn_seconds_left.saturating_sub(1);
            self.broadcast_timer();
            if self.battle.turn_seconds_left == 0 {
                if let Some(outcome) = turns::expire_turn(&mut self.battle) {
                    if !self.after_handover(outcome).await {
                        return false;
                    }
                }
            }
        }

        // Grace-period watch: a player out for too long auto-surrenders.
        if self.battle.status == BattleStatus::Active {
            let grace = Duration::from_secs(settings().disconnect_grace);
            let expired: Vec<Uuid> = self
                .dc_since
                .iter()
                .filter(|(_, t)| t.elapsed() >= grace)
                .map(|(pid, _)| *pid)
                .collect();
            for pid in expired {
                self.dc_since.remove(&pid);
                log::info!("player {pid} exceeded the reconnect window, auto-surrendering");
                if !self.surrender(pid, EndReason::Abandonment).await {
                    return false;
                }
            }
        }

        // Nobody human left: park the battle and free this task. A failed
        // save keeps the session alive and authoritative.
        if let Some(t) = self.abandon_since {
            if t.elapsed() >= Duration::from_secs(settings().abandon_grace) {
                if self.battle.status != BattleStatus::Active {
                    registry::unbind_battle_players(self.battle.id);
                    return false;
                }
                let snap = BattleSnapshot::capture(&self.battle);
                match self.store.save(&snap).await {
                    Ok(()) => {
                        log::info!("battle {} parked to the durable store", self.battle.id);
                        return false;
                    }
                    Err(e) => {
                        log::warn!("park failed for {}, staying live: {e:?}", self.battle.id);
                        self.abandon_since = Some(Instant::now());
                    }
                }
            }
        }
        true
    }

    /// Battle over: broadcast the verdict and tear everything down.
    async fn finish(&mut self, winner_id: Option<Uuid>, reason: EndReason) -> bool {
        let battle_id = self.battle.id;
        self.broadcast(&ServerMsg::BattleEnded {
            battle_id,
            winner_id,
            reason,
        });
        if let Err(e) = self.store.delete(battle_id).await {
            log::warn!("snapshot cleanup failed for {battle_id}: {e:?}");
        }
        registry::unbind_battle_players(battle_id);
        false
    }
}

/// Presence key helper shared with the WS layer.
pub async fn mark_presence(redis: &RedisClient, player_id: Uuid) {
    if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
        let key = format!("session:{player_id}");
        let _: () = conn
            .set_ex(&key, "1", settings().presence_ttl)
            .await
            .unwrap_or(());
    }
}
