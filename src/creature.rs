//! Persistent creature entity.
//!
//! A `Creature` outlives battles: level, experience, HP, bond and equipped
//! modules persist. Combat-only state lives in
//! [`CombatantState`](crate::CombatantState), which wraps a creature for the
//! length of one battle.

use crate::ability::AbilitySource;
use crate::content::{ContentCatalog, SpeciesDefinition};
use crate::error::CombatError;
use crate::ids::{AbilityId, CreatureId, ModuleInstanceId, SpeciesId};
use crate::modifier::{SourceId, StatModifier};
use crate::module::ResourceModule;
use crate::profile::StatProfile;
use crate::socket::SocketConfiguration;
use crate::stat_type::StatType;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Story predicates supplied by the host game.
///
/// The core never reads quest or flag state directly.
pub trait StoryFlags {
    fn has_flag(&self, flag: &str) -> bool;
    fn has_augmentation(&self, creature: CreatureId, augmentation: &str) -> bool;
}

/// [`StoryFlags`] backed by plain closures.
pub struct StoryCallbacks<F, G>
where
    F: Fn(&str) -> bool,
    G: Fn(CreatureId, &str) -> bool,
{
    pub has_flag: F,
    pub has_augmentation: G,
}

impl<F, G> StoryFlags for StoryCallbacks<F, G>
where
    F: Fn(&str) -> bool,
    G: Fn(CreatureId, &str) -> bool,
{
    fn has_flag(&self, flag: &str) -> bool {
        (self.has_flag)(flag)
    }

    fn has_augmentation(&self, creature: CreatureId, augmentation: &str) -> bool {
        (self.has_augmentation)(creature, augmentation)
    }
}

/// Conditions for evolving into another species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionRule {
    pub into: SpeciesId,
    pub min_level: u32,
    pub min_bond: u32,
    pub required_flag: Option<String>,
    pub required_augmentation: Option<String>,
}

impl EvolutionRule {
    pub fn new(into: &str, min_level: u32) -> Self {
        Self {
            into: SpeciesId::new(into),
            min_level,
            min_bond: 0,
            required_flag: None,
            required_augmentation: None,
        }
    }

    pub fn with_bond(mut self, bond: u32) -> Self {
        self.min_bond = bond;
        self
    }

    pub fn with_flag(mut self, flag: &str) -> Self {
        self.required_flag = Some(flag.to_string());
        self
    }

    pub fn with_augmentation(mut self, augmentation: &str) -> Self {
        self.required_augmentation = Some(augmentation.to_string());
        self
    }
}

/// Result of an evolution check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvolutionOutcome {
    Evolved { from: SpeciesId, into: SpeciesId },
    NotReady { reason: String },
    NoEvolution,
}

/// Result of a recruitment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecruitOutcome {
    Recruited,
    Refused { reason: String },
    Impossible { reason: String },
}

/// Recruitment chance in percent.
///
/// The species base chance grows with the target's missing HP fraction
/// (up to double at 0 HP) and with the recruiter's luck.
pub fn recruit_chance(species: &SpeciesDefinition, hp_fraction: f32, luck: f32) -> f32 {
    let missing = 1.0 - hp_fraction.clamp(0.0, 1.0);
    (species.recruit_chance * (1.0 + missing) + luck / 2.0).clamp(0.0, 100.0)
}

/// Persisted shape of a creature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatureRecord {
    pub instance_id: CreatureId,
    pub species_id: SpeciesId,
    pub level: u32,
    pub experience: u64,
    pub current_hp: i32,
    pub equipped_slots: Vec<Option<ModuleInstanceId>>,
    pub bond_level: u32,
    pub legacy_abilities: Vec<AbilityId>,
}

/// A rejected equip, handing the module back to the caller.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct EquipError {
    pub error: CombatError,
    pub module: ResourceModule,
}

/// A persistent creature.
#[derive(Debug, Clone)]
pub struct Creature {
    pub id: CreatureId,
    pub nickname: Option<String>,
    pub level: u32,
    pub experience: u64,
    pub current_hp: i32,
    pub bond_level: u32,
    pub legacy_abilities: Vec<AbilityId>,
    species: Arc<SpeciesDefinition>,
    sockets: SocketConfiguration,
    slots: Vec<Option<ResourceModule>>,
}

impl Creature {
    /// Create a level-1 creature at full HP.
    pub fn new(id: CreatureId, species: Arc<SpeciesDefinition>) -> Result<Self, CombatError> {
        let sockets = SocketConfiguration::from_layout(&species.sockets)?;
        let slots = vec![None; sockets.socket_count()];
        let mut creature = Self {
            id,
            nickname: None,
            level: 1,
            experience: 0,
            current_hp: 0,
            bond_level: 0,
            legacy_abilities: Vec::new(),
            species,
            sockets,
            slots,
        };
        creature.current_hp = creature.max_hp();
        Ok(creature)
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level.max(1);
        self
    }

    pub fn species(&self) -> &SpeciesDefinition {
        &self.species
    }

    pub fn name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.species.name)
    }

    pub fn sockets(&self) -> &SocketConfiguration {
        &self.sockets
    }

    pub fn module(&self, socket: usize) -> Option<&ResourceModule> {
        self.slots.get(socket)?.as_ref()
    }

    pub fn module_mut(&mut self, socket: usize) -> Option<&mut ResourceModule> {
        self.slots.get_mut(socket)?.as_mut()
    }

    /// Equipped modules with their socket index.
    pub fn modules(&self) -> impl Iterator<Item = (usize, &ResourceModule)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.as_ref().map(|m| (i, m)))
    }

    pub fn modules_mut(&mut self) -> impl Iterator<Item = &mut ResourceModule> {
        self.slots.iter_mut().flatten()
    }

    /// Max HP from species base values and equipped modules.
    pub fn max_hp(&self) -> i32 {
        self.build_profile().get_total(StatType::HpMax) as i32
    }

    /// Put a module in a socket, returning whatever it displaced.
    ///
    /// On an out-of-range socket or unmet level requirement the module is
    /// handed back inside the error.
    pub fn try_equip(
        &mut self,
        socket: usize,
        mut module: ResourceModule,
    ) -> Result<Option<ResourceModule>, EquipError> {
        if let Err(error) = self.sockets.check_access(socket, self.level) {
            return Err(EquipError { error, module });
        }
        module.set_equipped_socket(Some(socket));
        let displaced = self.slots[socket].replace(module);
        Ok(displaced.map(|mut m| {
            m.set_equipped_socket(None);
            m
        }))
    }

    /// Equip, reporting rejection as `false`.
    ///
    /// A rejected module is returned through `rejected`; a displaced one
    /// through `displaced`.
    pub fn equip(
        &mut self,
        socket: usize,
        module: ResourceModule,
        displaced: &mut Option<ResourceModule>,
        rejected: &mut Option<ResourceModule>,
    ) -> bool {
        match self.try_equip(socket, module) {
            Ok(old) => {
                *displaced = old;
                true
            }
            Err(e) => {
                tracing::warn!("{} rejected equip: {}", self.name(), e.error);
                *rejected = Some(e.module);
                false
            }
        }
    }

    /// Remove the module in a socket; `None` if the socket is empty or
    /// out of range.
    pub fn unequip(&mut self, socket: usize) -> Option<ResourceModule> {
        let mut module = self.slots.get_mut(socket)?.take()?;
        module.set_equipped_socket(None);
        Some(module)
    }

    /// Combat profile: species base values, module modifiers scaled by
    /// firmware, and link bonuses for fully occupied linked pairs.
    pub fn build_profile(&self) -> StatProfile {
        let mut profile = StatProfile::with_base(self.species.base_stats.iter().copied());
        for (_, module) in self.modules() {
            for m in module.granted_modifiers() {
                profile.add_modifier(m);
            }
        }
        for m in self.link_modifiers() {
            profile.add_modifier(m);
        }
        profile
    }

    /// Link bonuses for every linked pair where both sockets hold a module.
    pub fn link_modifiers(&self) -> Vec<StatModifier> {
        let mut out = Vec::new();
        for (a, b) in self.sockets.linked_pairs() {
            let (Some(ma), Some(mb)) = (self.module(a), self.module(b)) else {
                continue;
            };
            let source = SourceId::Link {
                first: a,
                second: b,
            };
            for module in [ma, mb] {
                let mult = module.effect_multiplier();
                for m in &module.definition().link_bonus {
                    out.push(
                        m.scaled(mult)
                            .with_source(source.clone(), format!("{} link", module.definition().name)),
                    );
                }
            }
        }
        out
    }

    /// Every ability the creature can bring into battle, with its source.
    pub fn abilities(&self) -> Vec<(AbilityId, AbilitySource)> {
        let mut out: Vec<(AbilityId, AbilitySource)> = self
            .species
            .innate_abilities
            .iter()
            .map(|a| (a.clone(), AbilitySource::Innate))
            .collect();
        for (socket, module) in self.modules() {
            for a in &module.definition().abilities {
                if !out.iter().any(|(id, _)| id == a) {
                    out.push((a.clone(), AbilitySource::Socket(socket)));
                }
            }
        }
        for a in &self.legacy_abilities {
            if !out.iter().any(|(id, _)| id == a) {
                out.push((a.clone(), AbilitySource::Legacy));
            }
        }
        out
    }

    /// Check the species' evolution rules in order.
    pub fn check_evolution(&self, story: &dyn StoryFlags) -> EvolutionOutcome {
        let mut first_reason = None;
        for rule in &self.species.evolutions {
            match self.evolution_blocker(rule, story) {
                None => {
                    return EvolutionOutcome::Evolved {
                        from: self.species.id.clone(),
                        into: rule.into.clone(),
                    }
                }
                Some(reason) => {
                    first_reason.get_or_insert(reason);
                }
            }
        }
        match first_reason {
            Some(reason) => EvolutionOutcome::NotReady { reason },
            None => EvolutionOutcome::NoEvolution,
        }
    }

    /// Evolve if a rule is satisfied, swapping in the new species.
    ///
    /// Equipped modules stay in place when the new layout still has their
    /// socket; others are returned.
    pub fn evolve(
        &mut self,
        catalog: &ContentCatalog,
        story: &dyn StoryFlags,
    ) -> (EvolutionOutcome, Vec<ResourceModule>) {
        let outcome = self.check_evolution(story);
        let EvolutionOutcome::Evolved { into, .. } = outcome.clone() else {
            return (outcome, Vec::new());
        };
        let Some(species) = catalog.species(&into) else {
            return (
                EvolutionOutcome::NotReady {
                    reason: format!("species {into} is not in the catalog"),
                },
                Vec::new(),
            );
        };
        let sockets = match SocketConfiguration::from_layout(&species.sockets) {
            Ok(s) => s,
            Err(e) => {
                return (
                    EvolutionOutcome::NotReady {
                        reason: e.to_string(),
                    },
                    Vec::new(),
                )
            }
        };

        let old_slots = std::mem::take(&mut self.slots);
        self.slots = vec![None; sockets.socket_count()];
        self.sockets = sockets;
        self.species = species;

        let mut returned = Vec::new();
        for (i, module) in old_slots.into_iter().enumerate() {
            let Some(module) = module else { continue };
            match self.try_equip(i, module) {
                Ok(_) => {}
                Err(e) => returned.push(e.module),
            }
        }
        self.current_hp = self.current_hp.min(self.max_hp());
        tracing::debug!("{} evolved into {}", self.name(), self.species.name);
        (outcome, returned)
    }

    fn evolution_blocker(&self, rule: &EvolutionRule, story: &dyn StoryFlags) -> Option<String> {
        if self.level < rule.min_level {
            return Some(format!("requires level {}", rule.min_level));
        }
        if self.bond_level < rule.min_bond {
            return Some(format!("requires bond {}", rule.min_bond));
        }
        if let Some(flag) = &rule.required_flag {
            if !story.has_flag(flag) {
                return Some(format!("requires story flag '{flag}'"));
            }
        }
        if let Some(aug) = &rule.required_augmentation {
            if !story.has_augmentation(self.id, aug) {
                return Some(format!("requires augmentation '{aug}'"));
            }
        }
        None
    }

    pub fn to_record(&self) -> CreatureRecord {
        CreatureRecord {
            instance_id: self.id,
            species_id: self.species.id.clone(),
            level: self.level,
            experience: self.experience,
            current_hp: self.current_hp,
            equipped_slots: self
                .slots
                .iter()
                .map(|m| m.as_ref().map(|m| m.instance_id()))
                .collect(),
            bond_level: self.bond_level,
            legacy_abilities: self.legacy_abilities.clone(),
        }
    }

    /// Rebuild a creature from its record and its restored modules.
    ///
    /// Modules are placed by the record's slot list; unknown species yields
    /// `None`. Modules the record does not mention are ignored.
    pub fn from_record(
        record: &CreatureRecord,
        modules: Vec<ResourceModule>,
        catalog: &ContentCatalog,
    ) -> Option<Self> {
        let species = catalog.species(&record.species_id)?;
        let mut creature = Self::new(record.instance_id, species).ok()?;
        creature.level = record.level.max(1);
        creature.experience = record.experience;
        creature.bond_level = record.bond_level;
        creature.legacy_abilities = record.legacy_abilities.clone();

        let mut pool = modules;
        for (socket, wanted) in record.equipped_slots.iter().enumerate() {
            let Some(wanted) = wanted else { continue };
            if let Some(pos) = pool.iter().position(|m| m.instance_id() == *wanted) {
                let module = pool.swap_remove(pos);
                if let Err(e) = creature.try_equip(socket, module) {
                    tracing::warn!("dropping module {} on restore: {}", wanted, e.error);
                }
            }
        }
        creature.current_hp = record.current_hp.clamp(0, creature.max_hp());
        Some(creature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::{AbilityDefinition, AbilityKind, TargetShape};
    use crate::content::SocketLayout;
    use crate::module::ModuleDefinition;

    fn catalog() -> ContentCatalog {
        ContentCatalog::builder()
            .ability(AbilityDefinition::new("bite", AbilityKind::Damage, TargetShape::SingleEnemy, 10.0))
            .ability(AbilityDefinition::new("flare", AbilityKind::Damage, TargetShape::AllEnemies, 25.0))
            .module(
                ModuleDefinition::new("plating", 100.0, 20.0, 20.0)
                    .with_modifier(StatModifier::flat(StatType::HpMax, 20.0))
                    .with_link_bonus(StatModifier::percent(StatType::Defense, 10.0)),
            )
            .module(ModuleDefinition::new("ember", 100.0, 30.0, 20.0).with_ability("flare"))
            .species(
                SpeciesDefinition::new("pup")
                    .with_stat(StatType::HpMax, 100.0)
                    .with_stat(StatType::Defense, 10.0)
                    .with_ability("bite")
                    .with_sockets(SocketLayout {
                        socket_count: 3,
                        linked_pairs: vec![(0, 1)],
                        required_levels: vec![1, 1, 10],
                    })
                    .with_evolution(EvolutionRule::new("hound", 5).with_flag("moon")),
            )
            .species(SpeciesDefinition::new("hound").with_stat(StatType::HpMax, 150.0))
            .build()
            .unwrap()
    }

    fn module(catalog: &ContentCatalog, def: &str, id: u64) -> ResourceModule {
        ResourceModule::new(
            ModuleInstanceId(id),
            catalog.module(&def.into()).unwrap(),
        )
    }

    fn pup(catalog: &ContentCatalog) -> Creature {
        Creature::new(CreatureId(1), catalog.species(&"pup".into()).unwrap()).unwrap()
    }

    struct Flags(bool);

    impl StoryFlags for Flags {
        fn has_flag(&self, _flag: &str) -> bool {
            self.0
        }
        fn has_augmentation(&self, _creature: CreatureId, _augmentation: &str) -> bool {
            self.0
        }
    }

    #[test]
    fn test_equip_applies_modifiers() {
        let catalog = catalog();
        let mut c = pup(&catalog);
        assert_eq!(c.max_hp(), 100);
        assert!(c.try_equip(0, module(&catalog, "plating", 7)).unwrap().is_none());
        assert_eq!(c.max_hp(), 120);
        assert_eq!(c.module(0).unwrap().equipped_socket(), Some(0));

        let removed = c.unequip(0).unwrap();
        assert_eq!(removed.equipped_socket(), None);
        assert_eq!(c.max_hp(), 100);
        assert!(c.unequip(0).is_none());
        assert!(c.unequip(99).is_none());
    }

    #[test]
    fn test_equip_rejects_locked_socket() {
        let catalog = catalog();
        let mut c = pup(&catalog);
        let err = c.try_equip(2, module(&catalog, "plating", 7)).unwrap_err();
        assert!(matches!(err.error, CombatError::IllegalSocket { index: 2, .. }));
        assert_eq!(err.module.instance_id(), ModuleInstanceId(7));

        let mut displaced = None;
        let mut rejected = None;
        assert!(!c.equip(5, module(&catalog, "plating", 8), &mut displaced, &mut rejected));
        assert!(rejected.is_some());
        assert!(c.equip(1, module(&catalog, "plating", 9), &mut displaced, &mut rejected));
    }

    #[test]
    fn test_link_bonus_needs_both_partners() {
        let catalog = catalog();
        let mut c = pup(&catalog);
        c.try_equip(0, module(&catalog, "plating", 1)).unwrap();
        assert!(c.link_modifiers().is_empty());
        c.try_equip(1, module(&catalog, "plating", 2)).unwrap();
        assert_eq!(c.link_modifiers().len(), 2);
        // 10 × (1 + 20%)
        assert!((c.build_profile().get_total(StatType::Defense) - 12.0).abs() < 1e-3);
    }

    #[test]
    fn test_ability_sources() {
        let catalog = catalog();
        let mut c = pup(&catalog);
        c.legacy_abilities.push("tackle".into());
        c.try_equip(1, module(&catalog, "ember", 3)).unwrap();
        let abilities = c.abilities();
        assert_eq!(abilities[0], ("bite".into(), AbilitySource::Innate));
        assert_eq!(abilities[1], ("flare".into(), AbilitySource::Socket(1)));
        assert_eq!(abilities[2], ("tackle".into(), AbilitySource::Legacy));
    }

    #[test]
    fn test_evolution_outcomes() {
        let catalog = catalog();
        let mut c = pup(&catalog);
        assert!(matches!(
            c.check_evolution(&Flags(true)),
            EvolutionOutcome::NotReady { ref reason } if reason.contains("level 5")
        ));

        c.level = 5;
        assert!(matches!(
            c.check_evolution(&Flags(false)),
            EvolutionOutcome::NotReady { ref reason } if reason.contains("moon")
        ));

        c.try_equip(0, module(&catalog, "plating", 1)).unwrap();
        let (outcome, returned) = c.evolve(&catalog, &Flags(true));
        assert_eq!(
            outcome,
            EvolutionOutcome::Evolved {
                from: "pup".into(),
                into: "hound".into()
            }
        );
        assert!(returned.is_empty());
        assert_eq!(c.species().name, "hound");
        assert_eq!(c.check_evolution(&Flags(true)), EvolutionOutcome::NoEvolution);
    }

    #[test]
    fn test_story_callbacks() {
        let story = StoryCallbacks {
            has_flag: |f: &str| f == "moon",
            has_augmentation: |_: CreatureId, _: &str| false,
        };
        assert!(story.has_flag("moon"));
        assert!(!story.has_augmentation(CreatureId(1), "x"));
    }

    #[test]
    fn test_record_round_trip() {
        let catalog = catalog();
        let mut c = pup(&catalog).with_level(3);
        c.bond_level = 2;
        c.try_equip(1, module(&catalog, "plating", 44)).unwrap();
        c.current_hp = 57;

        let record = c.to_record();
        let modules = vec![c.unequip(1).unwrap()];
        let restored = Creature::from_record(&record, modules, &catalog).unwrap();
        assert_eq!(restored.to_record(), record);
    }

    #[test]
    fn test_recruit_chance() {
        let species = SpeciesDefinition::new("pup");
        assert_eq!(recruit_chance(&species, 1.0, 0.0), 25.0);
        assert_eq!(recruit_chance(&species, 0.0, 0.0), 50.0);
        assert_eq!(recruit_chance(&species, 0.0, 200.0), 100.0);
    }
}
