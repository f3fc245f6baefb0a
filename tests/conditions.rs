//! The condition scanner is the only interpreter of status tags; these
//! tests pin its effect table.

use skirmish_server::battle::conditions::{end_of_turn, incoming, scan, Condition};
use skirmish_server::battle::types::ActionKind;

#[test]
fn no_conditions_means_no_restrictions() {
    for kind in [
        ActionKind::Move,
        ActionKind::Attack,
        ActionKind::Dash,
        ActionKind::Dodge,
    ] {
        let report = scan(&[], kind);
        assert!(report.can_perform);
        assert!(report.block_reason.is_none());
        assert!(report.expiring.is_empty());
    }
}

#[test]
fn stunned_blocks_everything() {
    for kind in [
        ActionKind::Move,
        ActionKind::Attack,
        ActionKind::Dash,
        ActionKind::Dodge,
    ] {
        let report = scan(&[Condition::Stunned], kind);
        assert!(!report.can_perform);
        assert_eq!(report.block_reason, Some("unit is stunned"));
    }
}

#[test]
fn rooted_blocks_movement_only() {
    assert!(!scan(&[Condition::Rooted], ActionKind::Move).can_perform);
    assert!(!scan(&[Condition::Rooted], ActionKind::Dash).can_perform);
    assert!(scan(&[Condition::Rooted], ActionKind::Attack).can_perform);
    assert!(scan(&[Condition::Rooted], ActionKind::Dodge).can_perform);
}

#[test]
fn enraged_boosts_attacks_and_expires_on_one() {
    let report = scan(&[Condition::Enraged], ActionKind::Attack);
    assert_eq!(report.modifiers.bonus_damage, 2);
    assert_eq!(report.expiring, vec![Condition::Enraged]);

    // Moving does not burn the rage.
    let report = scan(&[Condition::Enraged], ActionKind::Move);
    assert!(report.expiring.is_empty());
}

#[test]
fn frenzied_banks_an_extra_attack() {
    let report = scan(&[Condition::Frenzied], ActionKind::Attack);
    assert_eq!(report.modifiers.extra_attacks, 1);
    assert!(report.expiring.is_empty());
}

#[test]
fn dodging_is_consumed_by_the_next_incoming_attack() {
    let report = incoming(&[Condition::Dodging]);
    assert_eq!(report.dodge_chance_delta, 0.50);
    assert_eq!(report.expiring, vec![Condition::Dodging]);
}

#[test]
fn scan_reports_defensive_modifiers_too() {
    let report = scan(&[Condition::Shielded, Condition::Blessed], ActionKind::Move);
    assert!(report.can_perform);
    assert_eq!(report.modifiers.damage_reduction, 2);
    assert_eq!(report.modifiers.dodge_chance_delta, 0.10);
}

#[test]
fn shielded_and_blessed_stack_on_defense() {
    let report = incoming(&[Condition::Shielded, Condition::Blessed]);
    assert_eq!(report.damage_reduction, 2);
    assert_eq!(report.dodge_chance_delta, 0.10);
    assert!(report.expiring.is_empty());
}

#[test]
fn burning_damages_at_end_of_turn() {
    let decay = end_of_turn(&[Condition::Burning]);
    assert_eq!(decay.damage, 1);
    // Burning keeps ticking next turn.
    assert!(!decay.expiring.contains(&Condition::Burning));
}

#[test]
fn single_turn_tags_fall_off_at_end_of_turn() {
    let decay = end_of_turn(&[Condition::Stunned, Condition::Rooted, Condition::Blessed]);
    assert!(decay.expiring.contains(&Condition::Stunned));
    assert!(decay.expiring.contains(&Condition::Rooted));
    assert!(!decay.expiring.contains(&Condition::Blessed));
}
