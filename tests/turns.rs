//! Turn machine tests: exclusivity, rollover, exhaustion policies and the
//! win conditions.

use uuid::Uuid;

use skirmish_server::battle::conditions::Condition;
use skirmish_server::battle::turns::{
    begin_turn, check_battle_end, end_turn, expire_turn, resolve_defeat, surrender, EndReason,
    TurnError, DESPERATION_HP_COST,
};
use skirmish_server::battle::types::{
    Battle, BattleMode, BattleSetup, BattleStatus, GridTopology, RosterEntry, Unit, UnitCategory,
};

fn battle_with(mode: BattleMode, players: usize) -> (Battle, Vec<Uuid>) {
    let ids: Vec<Uuid> = (0..players).map(|_| Uuid::new_v4()).collect();
    let setup = BattleSetup {
        battle_id: Uuid::new_v4(),
        lobby_id: Uuid::new_v4(),
        mode,
        topology: GridTopology::EightWay,
        width: 10,
        height: 10,
        roster: ids
            .iter()
            .map(|&player_id| RosterEntry {
                player_id,
                kingdom_id: None,
                is_bot: false,
            })
            .collect(),
        units_per_player: 0,
        obstacle_count: 0,
    };
    let mut battle = Battle::new(&setup);
    battle.status = BattleStatus::Active;
    (battle, ids)
}

fn add_unit(battle: &mut Battle, owner: Uuid, x: i32, y: i32) -> Uuid {
    let unit = Unit::spawn(owner, UnitCategory::Footman, x, y);
    let id = unit.id;
    battle.units.push(unit);
    id
}

#[test]
fn begin_turn_grants_speed_based_resources() {
    let (mut battle, ids) = battle_with(BattleMode::Arena, 2);
    let a = add_unit(&mut battle, ids[0], 1, 1);
    add_unit(&mut battle, ids[1], 8, 8);

    let res = begin_turn(&mut battle, ids[0], a).unwrap();
    assert_eq!(res.moves, 3);
    assert_eq!(res.actions, 1);
    assert_eq!(res.attacks_banked, 0);
    assert!(res.desperation_hp_cost.is_none());

    let unit = battle.unit(a).unwrap();
    assert!(unit.has_started_action);
    assert_eq!(battle.active_unit_id, Some(a));
}

#[test]
fn only_the_scheduled_player_may_begin() {
    let (mut battle, ids) = battle_with(BattleMode::Arena, 2);
    add_unit(&mut battle, ids[0], 1, 1);
    let b = add_unit(&mut battle, ids[1], 8, 8);

    assert_eq!(
        begin_turn(&mut battle, ids[1], b).unwrap_err(),
        TurnError::NotYourTurn
    );
}

#[test]
fn one_acting_unit_at_a_time() {
    let (mut battle, ids) = battle_with(BattleMode::Arena, 2);
    let a = add_unit(&mut battle, ids[0], 1, 1);
    let a2 = add_unit(&mut battle, ids[0], 2, 1);
    add_unit(&mut battle, ids[1], 8, 8);

    begin_turn(&mut battle, ids[0], a).unwrap();
    assert_eq!(
        begin_turn(&mut battle, ids[0], a2).unwrap_err(),
        TurnError::TurnAlreadyStarted
    );

    // Invariant: the single started unit is the active one.
    let started: Vec<_> = battle
        .units
        .iter()
        .filter(|u| u.has_started_action)
        .collect();
    assert_eq!(started.len(), 1);
    assert_eq!(Some(started[0].id), battle.active_unit_id);
}

#[test]
fn cannot_begin_with_a_foreign_or_dead_unit() {
    let (mut battle, ids) = battle_with(BattleMode::Arena, 2);
    let a = add_unit(&mut battle, ids[0], 1, 1);
    let b = add_unit(&mut battle, ids[1], 8, 8);

    assert_eq!(
        begin_turn(&mut battle, ids[0], b).unwrap_err(),
        TurnError::NotYourUnit
    );
    battle.unit_mut(a).unwrap().is_alive = false;
    assert_eq!(
        begin_turn(&mut battle, ids[0], a).unwrap_err(),
        TurnError::DeadUnit
    );
}

#[test]
fn end_turn_clears_resources_and_advances() {
    let (mut battle, ids) = battle_with(BattleMode::Arena, 2);
    let a = add_unit(&mut battle, ids[0], 1, 1);
    add_unit(&mut battle, ids[1], 8, 8);

    begin_turn(&mut battle, ids[0], a).unwrap();
    let outcome = end_turn(&mut battle, ids[0], a).unwrap();
    assert!(!outcome.forced);
    assert_eq!(outcome.next_player, Some(ids[1]));
    assert!(outcome.new_round.is_none());

    let unit = battle.unit(a).unwrap();
    assert!(!unit.has_started_action);
    assert_eq!(unit.moves_left, 0);
    assert_eq!(unit.actions_left, 0);
    assert_eq!(unit.action_marks, 1);
    assert_eq!(battle.active_unit_id, None);
}

#[test]
fn round_rolls_over_after_a_full_lap() {
    let (mut battle, ids) = battle_with(BattleMode::Arena, 2);
    let a = add_unit(&mut battle, ids[0], 1, 1);
    let b = add_unit(&mut battle, ids[1], 8, 8);
    assert_eq!(battle.round, 1);

    begin_turn(&mut battle, ids[0], a).unwrap();
    let first = end_turn(&mut battle, ids[0], a).unwrap();
    assert!(first.new_round.is_none());

    begin_turn(&mut battle, ids[1], b).unwrap();
    let second = end_turn(&mut battle, ids[1], b).unwrap();
    assert_eq!(second.new_round, Some(2));
    assert_eq!(battle.round, 2);
    // Per-player action counters reset with the new round.
    assert!(battle.players.iter().all(|p| p.acted_this_round == 0));
    assert_eq!(battle.current_player_id(), Some(ids[0]));
}

#[test]
fn expiry_without_begin_turn_advances_cleanly() {
    let (mut battle, ids) = battle_with(BattleMode::Arena, 2);
    let a = add_unit(&mut battle, ids[0], 1, 1);
    add_unit(&mut battle, ids[1], 8, 8);

    let outcome = expire_turn(&mut battle).unwrap();
    assert!(outcome.forced);
    assert_eq!(outcome.ended_unit, None);
    assert_eq!(outcome.decay_damage, 0);
    assert_eq!(outcome.next_player, Some(ids[1]));

    // Nothing was consumed on the unit that never acted.
    let unit = battle.unit(a).unwrap();
    assert_eq!(unit.action_marks, 0);
    assert!(!unit.has_started_action);
}

#[test]
fn expiry_on_an_ended_battle_is_a_noop() {
    let (mut battle, _) = battle_with(BattleMode::Arena, 2);
    battle.status = BattleStatus::Ended;
    assert!(expire_turn(&mut battle).is_none());
}

#[test]
fn turn_advance_skips_players_without_living_units() {
    let (mut battle, ids) = battle_with(BattleMode::Arena, 3);
    let a = add_unit(&mut battle, ids[0], 1, 1);
    let b = add_unit(&mut battle, ids[1], 5, 5);
    add_unit(&mut battle, ids[2], 8, 8);

    battle.unit_mut(b).unwrap().is_alive = false;

    begin_turn(&mut battle, ids[0], a).unwrap();
    let outcome = end_turn(&mut battle, ids[0], a).unwrap();
    assert_eq!(outcome.next_player, Some(ids[2]));
}

#[test]
fn burning_ticks_when_the_turn_ends() {
    let (mut battle, ids) = battle_with(BattleMode::Arena, 2);
    let a = add_unit(&mut battle, ids[0], 1, 1);
    add_unit(&mut battle, ids[1], 8, 8);
    battle.unit_mut(a).unwrap().conditions.push(Condition::Burning);

    begin_turn(&mut battle, ids[0], a).unwrap();
    let hp_before = battle.unit(a).unwrap().hp;
    let outcome = end_turn(&mut battle, ids[0], a).unwrap();
    assert_eq!(outcome.decay_damage, 1);
    assert_eq!(battle.unit(a).unwrap().hp, hp_before - 1);
}

#[test]
fn arena_desperation_costs_hp_and_clears_marks() {
    let (mut battle, ids) = battle_with(BattleMode::Arena, 2);
    let a = add_unit(&mut battle, ids[0], 1, 1);
    add_unit(&mut battle, ids[1], 8, 8);
    {
        let unit = battle.unit_mut(a).unwrap();
        unit.action_marks = unit.category.max_marks();
    }
    let hp_before = battle.unit(a).unwrap().hp;

    let res = begin_turn(&mut battle, ids[0], a).unwrap();
    assert_eq!(res.desperation_hp_cost, Some(DESPERATION_HP_COST));
    let unit = battle.unit(a).unwrap();
    assert_eq!(unit.hp, hp_before - DESPERATION_HP_COST);
    assert_eq!(unit.action_marks, 0);
}

#[test]
fn field_mode_refuses_an_exhausted_unit() {
    let (mut battle, ids) = battle_with(BattleMode::Field, 2);
    let a = add_unit(&mut battle, ids[0], 1, 1);
    add_unit(&mut battle, ids[1], 8, 8);
    {
        let unit = battle.unit_mut(a).unwrap();
        unit.action_marks = unit.category.max_marks();
    }

    assert_eq!(
        begin_turn(&mut battle, ids[0], a).unwrap_err(),
        TurnError::UnitExhausted
    );
}

#[test]
fn field_battle_ends_on_collective_exhaustion() {
    let (mut battle, ids) = battle_with(BattleMode::Field, 2);
    let a = add_unit(&mut battle, ids[0], 1, 1);
    let b = add_unit(&mut battle, ids[1], 8, 8);

    for id in [a, b] {
        let unit = battle.unit_mut(id).unwrap();
        unit.action_marks = unit.category.max_marks();
    }
    // The fresher side carries the day.
    battle.unit_mut(b).unwrap().hp = 3;

    let verdict = check_battle_end(&battle).unwrap();
    assert_eq!(verdict.reason, EndReason::Exhaustion);
    assert_eq!(verdict.winner, Some(ids[0]));
}

#[test]
fn eliminating_the_last_unit_wins_the_battle() {
    let (mut battle, ids) = battle_with(BattleMode::Arena, 2);
    add_unit(&mut battle, ids[0], 1, 1);
    let b = add_unit(&mut battle, ids[1], 8, 8);

    assert!(check_battle_end(&battle).is_none());

    battle.unit_mut(b).unwrap().is_alive = false;
    let verdict = resolve_defeat(&mut battle).unwrap();
    assert_eq!(verdict.winner, Some(ids[0]));
    assert_eq!(verdict.reason, EndReason::Elimination);
    assert_eq!(battle.status, BattleStatus::Ended);
}

#[test]
fn mutual_destruction_is_a_draw() {
    let (mut battle, ids) = battle_with(BattleMode::Arena, 2);
    let a = add_unit(&mut battle, ids[0], 1, 1);
    let b = add_unit(&mut battle, ids[1], 8, 8);

    battle.unit_mut(a).unwrap().is_alive = false;
    battle.unit_mut(b).unwrap().is_alive = false;
    let verdict = resolve_defeat(&mut battle).unwrap();
    assert_eq!(verdict.winner, None);
}

#[test]
fn surrender_hands_victory_to_the_opponent() {
    let (mut battle, ids) = battle_with(BattleMode::Arena, 2);
    add_unit(&mut battle, ids[0], 1, 1);
    add_unit(&mut battle, ids[1], 8, 8);

    let verdict = surrender(&mut battle, ids[0], EndReason::Surrender)
        .unwrap()
        .unwrap();
    assert_eq!(verdict.winner, Some(ids[1]));
    assert_eq!(verdict.reason, EndReason::Surrender);
    assert_eq!(battle.status, BattleStatus::Ended);
    assert!(battle
        .units
        .iter()
        .filter(|u| u.owner_id == ids[0])
        .all(|u| !u.is_alive));
}

#[test]
fn three_way_battle_continues_after_one_surrender() {
    let (mut battle, ids) = battle_with(BattleMode::Arena, 3);
    add_unit(&mut battle, ids[0], 1, 1);
    add_unit(&mut battle, ids[1], 5, 5);
    add_unit(&mut battle, ids[2], 8, 8);

    let verdict = surrender(&mut battle, ids[0], EndReason::Abandonment).unwrap();
    assert!(verdict.is_none());
    assert_eq!(battle.status, BattleStatus::Active);
    // The leaver no longer holds the turn.
    assert_ne!(battle.current_player_id(), Some(ids[0]));
}
