use rand::rngs::mock::StepRng;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use zzcombat::ids::{CombatantId, CreatureId, ModuleInstanceId};
use zzcombat::*;

fn catalog() -> Arc<ContentCatalog> {
    Arc::new(
        ContentCatalog::builder()
            .ability(AbilityDefinition::new("bite", AbilityKind::Damage, TargetShape::SingleEnemy, 10.0))
            .ability(AbilityDefinition::new("crush", AbilityKind::Damage, TargetShape::SingleEnemy, 30.0))
            .ability(AbilityDefinition::new("quake", AbilityKind::Damage, TargetShape::AllEnemies, 25.0))
            .ability(AbilityDefinition::new("nova", AbilityKind::Damage, TargetShape::AllEnemies, 90.0).with_cost(50))
            .ability(AbilityDefinition::new("mend", AbilityKind::Heal, TargetShape::SelfOnly, 20.0))
            .ability(AbilityDefinition::new("salve", AbilityKind::Heal, TargetShape::SingleAlly, 20.0))
            .ability(AbilityDefinition::new("rally", AbilityKind::Heal, TargetShape::AllAllies, 15.0).with_cost(40))
            .ability(
                AbilityDefinition::new("hex", AbilityKind::Debuff, TargetShape::SingleEnemy, 0.0).with_stat_change(
                    StatChange {
                        stat: StatType::Defense,
                        value: -20.0,
                        is_percent: true,
                        duration: 2,
                    },
                ),
            )
            .ability(AbilityDefinition::new("scorch", AbilityKind::Damage, TargetShape::SingleEnemy, 80.0))
            .module(ModuleDefinition::new("furnace", 100.0, 150.0, 10.0).with_ability("scorch"))
            .species(SpeciesDefinition::new("grunt").with_stat(StatType::HpMax, 100.0))
            .species(
                SpeciesDefinition::new("healer")
                    .with_stat(StatType::HpMax, 100.0)
                    .with_ability("mend"),
            )
            .species(
                SpeciesDefinition::new("medic")
                    .with_stat(StatType::HpMax, 100.0)
                    .with_ability("salve"),
            )
            .species(
                SpeciesDefinition::new("cleric")
                    .with_stat(StatType::HpMax, 100.0)
                    .with_stat(StatType::EnMax, 10.0)
                    .with_ability("rally"),
            )
            .species(
                SpeciesDefinition::new("brute")
                    .with_stat(StatType::HpMax, 100.0)
                    .with_ability("bite")
                    .with_ability("crush"),
            )
            .species(
                SpeciesDefinition::new("shaman")
                    .with_stat(StatType::HpMax, 100.0)
                    .with_ability("hex"),
            )
            .species(
                SpeciesDefinition::new("weakling")
                    .with_stat(StatType::HpMax, 100.0)
                    .with_stat(StatType::EnMax, 10.0)
                    .with_ability("nova"),
            )
            .species(
                SpeciesDefinition::new("warlord")
                    .with_stat(StatType::HpMax, 100.0)
                    .with_ability("bite")
                    .with_ability("quake")
                    .with_ability("crush")
                    .boss(),
            )
            .build()
            .unwrap(),
    )
}

fn combatant(catalog: &ContentCatalog, species: &str, id: u32, team: Team) -> CombatantState {
    let creature = Creature::new(CreatureId(id as u64), catalog.species(&species.into()).unwrap()).unwrap();
    CombatantState::new(CombatantId(id), team, Controller::External, creature)
}

fn ai(catalog: &Arc<ContentCatalog>, difficulty: Difficulty) -> CombatAi {
    CombatAi::new(catalog.clone(), difficulty)
}

/// Rolls 0.0 on every probability check and picks the first element.
fn always_yes() -> StepRng {
    StepRng::new(0, 0)
}

/// Rolls just under 1.0 on every probability check.
///
/// Only usable on paths that make no random picks.
fn always_no() -> StepRng {
    StepRng::new(u64::MAX, 0)
}

#[test]
fn test_defensive_low_hp_uses_self_heal() {
    let catalog = catalog();
    let mut actor = combatant(&catalog, "healer", 0, Team::Enemy);
    actor.take_damage(90);
    assert_eq!(actor.hp(), 10);
    let foe = combatant(&catalog, "grunt", 1, Team::Player);

    let action = ai(&catalog, Difficulty::Normal).select_action(
        &actor,
        &[],
        &[&foe],
        Behavior::Defensive,
        &mut always_yes(),
    );
    assert_eq!(action.kind, ActionKind::Ability("mend".into()));
    assert_eq!(action.targets, vec![actor.id()]);
}

#[test]
fn test_defensive_low_hp_without_heal_defends() {
    let catalog = catalog();
    let mut actor = combatant(&catalog, "grunt", 0, Team::Enemy);
    actor.take_damage(80);
    let foe = combatant(&catalog, "grunt", 1, Team::Player);

    let action = ai(&catalog, Difficulty::Normal).select_action(
        &actor,
        &[],
        &[&foe],
        Behavior::Defensive,
        &mut always_yes(),
    );
    assert!(action.is_defend());

    // Losing the 50/50 roll falls through to attacking.
    let action = ai(&catalog, Difficulty::Normal).select_action(
        &actor,
        &[],
        &[&foe],
        Behavior::Defensive,
        &mut always_no(),
    );
    assert_eq!(action, CombatAction::attack(actor.id(), foe.id()));
}

#[test]
fn test_defensive_heals_most_wounded_ally() {
    let catalog = catalog();
    let actor = combatant(&catalog, "medic", 0, Team::Enemy);
    let mut hurt = combatant(&catalog, "grunt", 1, Team::Enemy);
    let mut worse = combatant(&catalog, "grunt", 2, Team::Enemy);
    hurt.take_damage(60);
    worse.take_damage(70);
    let foe = combatant(&catalog, "grunt", 3, Team::Player);

    let action = ai(&catalog, Difficulty::Normal).select_action(
        &actor,
        &[&hurt, &worse],
        &[&foe],
        Behavior::Defensive,
        &mut always_no(),
    );
    assert_eq!(action.kind, ActionKind::Ability("salve".into()));
    assert_eq!(action.targets, vec![worse.id()]);
}

#[test]
fn test_defensive_attacks_lowest_current_hp() {
    let catalog = catalog();
    let actor = combatant(&catalog, "grunt", 0, Team::Enemy);
    let a = combatant(&catalog, "grunt", 1, Team::Player);
    let mut b = combatant(&catalog, "grunt", 2, Team::Player);
    b.take_damage(30);

    let action = ai(&catalog, Difficulty::Normal).select_action(
        &actor,
        &[],
        &[&a, &b],
        Behavior::Defensive,
        &mut always_no(),
    );
    assert_eq!(action, CombatAction::attack(actor.id(), b.id()));
}

#[test]
fn test_no_enemies_means_defend() {
    let catalog = catalog();
    let actor = combatant(&catalog, "brute", 0, Team::Enemy);
    let ai = ai(&catalog, Difficulty::Nightmare);

    let action = ai.select_action(&actor, &[], &[], Behavior::Aggressive, &mut always_yes());
    assert!(action.is_defend());

    let mut dead = combatant(&catalog, "grunt", 1, Team::Player);
    dead.take_damage(1000);
    for behavior in [
        Behavior::Random,
        Behavior::Aggressive,
        Behavior::Defensive,
        Behavior::Support,
        Behavior::Balanced,
        Behavior::ThreatBased,
        Behavior::Boss,
    ] {
        let action = ai.select_action(&actor, &[], &[&dead], behavior, &mut always_yes());
        assert!(action.is_defend(), "{behavior:?} did not defend");
    }
}

#[test]
fn test_never_targets_the_dead() {
    let catalog = catalog();
    let behaviors = [
        Behavior::Random,
        Behavior::Aggressive,
        Behavior::Defensive,
        Behavior::Support,
        Behavior::Balanced,
        Behavior::ThreatBased,
        Behavior::Boss,
    ];
    let actors = ["brute", "healer", "medic", "shaman", "warlord"];

    let mut foes: Vec<CombatantState> = (10..14)
        .map(|i| combatant(&catalog, "grunt", i, Team::Player))
        .collect();
    foes[0].take_damage(1000);
    foes[2].take_damage(1000);
    foes[3].take_damage(55);
    let mut ally = combatant(&catalog, "grunt", 20, Team::Enemy);
    ally.take_damage(1000);

    let foe_refs: Vec<&CombatantState> = foes.iter().collect();
    let mut ai = ai(&catalog, Difficulty::Hard);
    ai.record_damage(CombatantId(10), CombatantId(1), 500);

    let mut rng = StdRng::seed_from_u64(42);
    for (i, species) in actors.iter().enumerate() {
        let mut actor = combatant(&catalog, species, i as u32, Team::Enemy);
        for hp_loss in [0, 50, 80] {
            if hp_loss > 0 {
                actor.take_damage(hp_loss - actor.max_hp() + actor.hp());
            }
            for behavior in behaviors {
                for _ in 0..50 {
                    let action = ai.select_action(&actor, &[&ally], &foe_refs, behavior, &mut rng);
                    for target in &action.targets {
                        let alive = foes
                            .iter()
                            .chain(std::iter::once(&actor))
                            .find(|c| c.id() == *target)
                            .map(|c| c.is_alive());
                        assert_eq!(alive, Some(true), "{behavior:?} targeted {target}");
                    }
                }
            }
        }
    }
}

#[test]
fn test_aggressive_focuses_lowest_hp_fraction() {
    let catalog = catalog();
    let actor = combatant(&catalog, "brute", 0, Team::Enemy);
    let a = combatant(&catalog, "grunt", 1, Team::Player);
    let mut b = combatant(&catalog, "grunt", 2, Team::Player);
    b.take_damage(60);
    let ai = ai(&catalog, Difficulty::Normal);

    let action = ai.select_action(&actor, &[], &[&a, &b], Behavior::Aggressive, &mut always_yes());
    assert_eq!(action.kind, ActionKind::Ability("crush".into()));
    assert_eq!(action.targets, vec![b.id()]);

    let action = ai.select_action(&actor, &[], &[&a, &b], Behavior::Aggressive, &mut always_no());
    assert_eq!(action, CombatAction::attack(actor.id(), b.id()));
}

#[test]
fn test_unaffordable_ability_falls_back_to_attack() {
    let catalog = catalog();
    let actor = combatant(&catalog, "weakling", 0, Team::Enemy);
    let foe = combatant(&catalog, "grunt", 1, Team::Player);
    assert!(actor.ready_abilities(&catalog).is_empty());

    let action = ai(&catalog, Difficulty::Nightmare).select_action(
        &actor,
        &[],
        &[&foe],
        Behavior::Aggressive,
        &mut always_yes(),
    );
    assert_eq!(action, CombatAction::attack(actor.id(), foe.id()));
}

#[test]
fn test_overheated_module_is_not_used() {
    let catalog = catalog();
    let mut creature = Creature::new(CreatureId(0), catalog.species(&"grunt".into()).unwrap()).unwrap();
    creature
        .try_equip(0, ResourceModule::new(ModuleInstanceId(9), catalog.module(&"furnace".into()).unwrap()))
        .unwrap();
    let mut actor = CombatantState::new(CombatantId(0), Team::Enemy, Controller::External, creature);
    let foe = combatant(&catalog, "grunt", 1, Team::Player);

    let scorch = catalog.ability(&"scorch".into()).unwrap();
    let usage = actor.spend_ability(&scorch).unwrap().unwrap();
    assert!(usage.overheated);
    assert!(actor.energy() > 0.0);

    let action = ai(&catalog, Difficulty::Nightmare).select_action(
        &actor,
        &[],
        &[&foe],
        Behavior::Aggressive,
        &mut always_yes(),
    );
    assert_eq!(action, CombatAction::attack(actor.id(), foe.id()));
}

#[test]
fn test_threat_based_targets_highest_threat() {
    let catalog = catalog();
    let actor = combatant(&catalog, "grunt", 0, Team::Enemy);
    let a = combatant(&catalog, "grunt", 1, Team::Player);
    let b = combatant(&catalog, "grunt", 2, Team::Player);

    let mut ai = ai(&catalog, Difficulty::Normal);
    ai.record_damage(a.id(), actor.id(), 50);
    ai.record_damage(b.id(), actor.id(), 80);
    ai.end_turn();
    assert_eq!(ai.threat().get_highest(&[&a, &b]).map(|c| c.id()), Some(b.id()));
    assert_eq!(ai.threat().threat_display(a.id()), 45);
    assert_eq!(ai.threat().threat_display(b.id()), 72);

    let action = ai.select_action(&actor, &[], &[&a, &b], Behavior::ThreatBased, &mut always_no());
    assert_eq!(action, CombatAction::attack(actor.id(), b.id()));
}

#[test]
fn test_threat_based_falls_back_to_first_enemy() {
    let catalog = catalog();
    let actor = combatant(&catalog, "grunt", 0, Team::Enemy);
    let a = combatant(&catalog, "grunt", 1, Team::Player);
    let b = combatant(&catalog, "grunt", 2, Team::Player);

    let action = ai(&catalog, Difficulty::Normal).select_action(
        &actor,
        &[],
        &[&a, &b],
        Behavior::ThreatBased,
        &mut always_no(),
    );
    assert_eq!(action, CombatAction::attack(actor.id(), a.id()));
}

#[test]
fn test_threat_ignores_dead_candidates() {
    let catalog = catalog();
    let mut a = combatant(&catalog, "grunt", 1, Team::Player);
    let b = combatant(&catalog, "grunt", 2, Team::Player);
    let mut table = ThreatTable::new();
    table.add_threat(a.id(), 500.0);
    table.add_threat(b.id(), 5.0);
    a.take_damage(1000);
    assert_eq!(table.get_highest(&[&a, &b]).map(|c| c.id()), Some(b.id()));
}

#[test]
fn test_support_prefers_support_abilities() {
    let catalog = catalog();
    let actor = combatant(&catalog, "shaman", 0, Team::Enemy);
    let foe = combatant(&catalog, "grunt", 1, Team::Player);

    let action = ai(&catalog, Difficulty::Easy).select_action(
        &actor,
        &[],
        &[&foe],
        Behavior::Support,
        &mut always_yes(),
    );
    assert_eq!(action.kind, ActionKind::Ability("hex".into()));
    assert_eq!(action.targets, vec![foe.id()]);
}

#[test]
fn test_random_attacks_on_low_roll() {
    let catalog = catalog();
    let actor = combatant(&catalog, "brute", 0, Team::Enemy);
    let mut dead = combatant(&catalog, "grunt", 1, Team::Player);
    dead.take_damage(1000);
    let foe = combatant(&catalog, "grunt", 2, Team::Player);

    let action = ai(&catalog, Difficulty::Normal).select_action(
        &actor,
        &[],
        &[&dead, &foe],
        Behavior::Random,
        &mut always_yes(),
    );
    assert_eq!(action, CombatAction::attack(actor.id(), foe.id()));
}

#[test]
fn test_support_without_usable_heal_attacks() {
    let catalog = catalog();
    let actor = combatant(&catalog, "cleric", 0, Team::Enemy);
    let mut ally = combatant(&catalog, "grunt", 1, Team::Enemy);
    ally.take_damage(80);
    let foe = combatant(&catalog, "grunt", 2, Team::Player);

    // The roll favors support, but rally costs more energy than the cleric has.
    let action = ai(&catalog, Difficulty::Nightmare).select_action(
        &actor,
        &[&ally],
        &[&foe],
        Behavior::Support,
        &mut always_yes(),
    );
    assert_eq!(action, CombatAction::attack(actor.id(), foe.id()));
}

/// First roll is 0.9375; the next draws are low enough to pick the first
/// element of any short slice.
fn high_then_low() -> StepRng {
    StepRng::new(0xF000_0000, 0x1000_0000)
}

#[test]
fn test_random_uses_ability_on_high_roll() {
    let catalog = catalog();
    let actor = combatant(&catalog, "brute", 0, Team::Enemy);
    let foe = combatant(&catalog, "grunt", 1, Team::Player);

    let action = ai(&catalog, Difficulty::Normal).select_action(
        &actor,
        &[],
        &[&foe],
        Behavior::Random,
        &mut high_then_low(),
    );
    match &action.kind {
        ActionKind::Ability(id) => assert!(actor.abilities().contains(id)),
        other => panic!("expected an ability, got {other:?}"),
    }
    assert_eq!(action.targets, vec![foe.id()]);
}

#[test]
fn test_random_without_abilities_attacks_on_high_roll() {
    let catalog = catalog();
    let actor = combatant(&catalog, "grunt", 0, Team::Enemy);
    let foe = combatant(&catalog, "grunt", 1, Team::Player);

    let action = ai(&catalog, Difficulty::Normal).select_action(
        &actor,
        &[],
        &[&foe],
        Behavior::Random,
        &mut high_then_low(),
    );
    assert_eq!(action, CombatAction::attack(actor.id(), foe.id()));
}

#[test]
fn test_balanced_delegates_to_defensive_when_low() {
    let catalog = catalog();
    let mut actor = combatant(&catalog, "healer", 0, Team::Enemy);
    actor.take_damage(75);
    let foe = combatant(&catalog, "grunt", 1, Team::Player);

    let action = ai(&catalog, Difficulty::Normal).select_action(
        &actor,
        &[],
        &[&foe],
        Behavior::Balanced,
        &mut always_no(),
    );
    assert_eq!(action.kind, ActionKind::Ability("mend".into()));
}

#[test]
fn test_balanced_rescues_ally_in_trouble() {
    let catalog = catalog();
    let actor = combatant(&catalog, "medic", 0, Team::Enemy);
    let mut ally = combatant(&catalog, "grunt", 1, Team::Enemy);
    ally.take_damage(70);
    let foe = combatant(&catalog, "grunt", 2, Team::Player);
    let ai = ai(&catalog, Difficulty::Normal);

    let action = ai.select_action(&actor, &[&ally], &[&foe], Behavior::Balanced, &mut always_yes());
    assert_eq!(action.kind, ActionKind::Ability("salve".into()));
    assert_eq!(action.targets, vec![ally.id()]);

    // Failed rescue roll: aggressive, and the medic has no damage ability.
    let action = ai.select_action(&actor, &[&ally], &[&foe], Behavior::Balanced, &mut always_no());
    assert_eq!(action, CombatAction::attack(actor.id(), foe.id()));
}

#[test]
fn test_boss_phases() {
    let catalog = catalog();
    let a = combatant(&catalog, "grunt", 1, Team::Player);
    let mut b = combatant(&catalog, "grunt", 2, Team::Player);
    b.take_damage(40);
    let ai = ai(&catalog, Difficulty::Normal);

    // Calm phase: balanced, which is aggressive with no ally trouble.
    let boss = combatant(&catalog, "warlord", 0, Team::Enemy);
    let action = ai.select_action(&boss, &[], &[&a, &b], Behavior::Boss, &mut always_no());
    assert_eq!(action, CombatAction::attack(boss.id(), b.id()));

    // Middle phase: sweeping ability.
    let mut boss = combatant(&catalog, "warlord", 0, Team::Enemy);
    boss.take_damage(50);
    let action = ai.select_action(&boss, &[], &[&a, &b], Behavior::Boss, &mut always_yes());
    assert_eq!(action.kind, ActionKind::Ability("quake".into()));
    assert_eq!(action.targets, vec![a.id(), b.id()]);

    // Execute phase: strongest damage ability with no roll, on the lowest HP.
    boss.take_damage(30);
    assert!(boss.hp_fraction() < 0.3);
    let action = ai.select_action(&boss, &[], &[&a, &b], Behavior::Boss, &mut always_no());
    assert_eq!(action.kind, ActionKind::Ability("crush".into()));
    assert_eq!(action.targets, vec![b.id()]);
}
