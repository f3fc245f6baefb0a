//! A parked battle must come back exactly as it was: turn order, resources
//! and conditions included.

use uuid::Uuid;

use skirmish_server::battle::conditions::Condition;
use skirmish_server::battle::snapshot::BattleSnapshot;
use skirmish_server::battle::turns::begin_turn;
use skirmish_server::battle::types::{
    Battle, BattleMode, BattleSetup, BattleStatus, GridTopology, RosterEntry, Unit, UnitCategory,
};

fn mid_battle() -> (Battle, Uuid, Uuid) {
    let p1 = Uuid::new_v4();
    let p2 = Uuid::new_v4();
    let setup = BattleSetup {
        battle_id: Uuid::new_v4(),
        lobby_id: Uuid::new_v4(),
        mode: BattleMode::Field,
        topology: GridTopology::FourWay,
        width: 12,
        height: 8,
        roster: vec![
            RosterEntry {
                player_id: p1,
                kingdom_id: Some(Uuid::new_v4()),
                is_bot: false,
            },
            RosterEntry {
                player_id: p2,
                kingdom_id: None,
                is_bot: true,
            },
        ],
        units_per_player: 0,
        obstacle_count: 0,
    };
    let mut battle = Battle::new(&setup);
    battle.status = BattleStatus::Active;

    let unit = Unit::spawn(p1, UnitCategory::Raider, 3, 4);
    let unit_id = unit.id;
    battle.units.push(unit);
    battle.units.push(Unit::spawn(p2, UnitCategory::Champion, 9, 2));

    begin_turn(&mut battle, p1, unit_id).unwrap();
    let unit = battle.unit_mut(unit_id).unwrap();
    unit.moves_left = 2;
    unit.conditions.push(Condition::Burning);
    unit.conditions.push(Condition::Blessed);
    battle.turn_seconds_left = 17;
    battle.round = 4;
    battle.push_log("checkpoint");

    (battle, p1, unit_id)
}

#[test]
fn snapshot_round_trips_through_json() {
    let (battle, p1, unit_id) = mid_battle();
    let snap = BattleSnapshot::capture(&battle);

    let json = serde_json::to_string(&snap).unwrap();
    let restored: BattleSnapshot = serde_json::from_str(&json).unwrap();
    let restored = restored.battle;

    // Turn order and status resume exactly.
    assert_eq!(restored.status, BattleStatus::Active);
    assert_eq!(restored.current_turn_index, battle.current_turn_index);
    assert_eq!(restored.current_player_id(), Some(p1));
    assert_eq!(restored.active_unit_id, Some(unit_id));
    assert_eq!(restored.round, 4);
    assert_eq!(restored.turn_seconds_left, 17);

    // Mid-turn resources survive the trip.
    let unit = restored.unit(unit_id).unwrap();
    assert!(unit.has_started_action);
    assert_eq!(unit.moves_left, 2);
    assert_eq!(unit.actions_left, 1);
    assert_eq!(
        unit.conditions,
        vec![Condition::Burning, Condition::Blessed]
    );

    // Roster flags and the log go with the aggregate.
    assert!(restored.player(p1).unwrap().kingdom_id.is_some());
    assert!(restored.players.iter().any(|p| p.is_bot));
    assert_eq!(restored.log.len(), battle.log.len());
}

#[test]
fn snapshot_preserves_the_whole_grid() {
    let (battle, _, _) = mid_battle();
    let snap = BattleSnapshot::capture(&battle);
    let json = serde_json::to_string(&snap).unwrap();
    let restored: BattleSnapshot = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.battle.width, 12);
    assert_eq!(restored.battle.height, 8);
    assert_eq!(restored.battle.topology, GridTopology::FourWay);
    assert_eq!(restored.battle.mode, BattleMode::Field);
    assert_eq!(restored.battle.units.len(), battle.units.len());
}
