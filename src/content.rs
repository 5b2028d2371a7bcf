//! Content catalog module.
//!
//! The catalog holds every immutable definition a battle needs: abilities,
//! module definitions and species. It is built once, validated, and injected
//! into the engine as `Arc<ContentCatalog>`; nothing in the crate reads
//! definitions from global state.

use crate::ability::AbilityDefinition;
use crate::creature::EvolutionRule;
use crate::error::ContentError;
use crate::ids::{AbilityId, ModuleDefId, SpeciesId};
use crate::module::ModuleDefinition;
use crate::stat_type::StatType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Socket layout shared by every creature of a species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketLayout {
    pub socket_count: usize,
    pub linked_pairs: Vec<(usize, usize)>,
    /// Creature level needed to use each socket; missing entries mean 1.
    pub required_levels: Vec<u32>,
}

impl Default for SocketLayout {
    fn default() -> Self {
        Self {
            socket_count: 4,
            linked_pairs: Vec::new(),
            required_levels: Vec::new(),
        }
    }
}

/// Immutable species content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesDefinition {
    pub id: SpeciesId,
    pub name: String,
    pub base_stats: Vec<(StatType, f32)>,
    pub innate_abilities: Vec<AbilityId>,
    pub sockets: SocketLayout,
    pub evolutions: Vec<EvolutionRule>,
    /// Base recruitment chance in percent.
    pub recruit_chance: f32,
    /// Bosses cannot be fled from or recruited.
    pub is_boss: bool,
}

impl SpeciesDefinition {
    pub fn new(id: &str) -> Self {
        Self {
            id: SpeciesId::new(id),
            name: id.to_string(),
            base_stats: Vec::new(),
            innate_abilities: Vec::new(),
            sockets: SocketLayout::default(),
            evolutions: Vec::new(),
            recruit_chance: 25.0,
            is_boss: false,
        }
    }

    pub fn with_stat(mut self, stat: StatType, value: f32) -> Self {
        self.base_stats.push((stat, value));
        self
    }

    pub fn with_ability(mut self, ability: &str) -> Self {
        self.innate_abilities.push(AbilityId::new(ability));
        self
    }

    pub fn with_sockets(mut self, sockets: SocketLayout) -> Self {
        self.sockets = sockets;
        self
    }

    pub fn with_evolution(mut self, rule: EvolutionRule) -> Self {
        self.evolutions.push(rule);
        self
    }

    pub fn boss(mut self) -> Self {
        self.is_boss = true;
        self
    }
}

/// Validated, immutable definition lookup tables.
#[derive(Debug, Default)]
pub struct ContentCatalog {
    abilities: HashMap<AbilityId, Arc<AbilityDefinition>>,
    modules: HashMap<ModuleDefId, Arc<ModuleDefinition>>,
    species: HashMap<SpeciesId, Arc<SpeciesDefinition>>,
}

impl ContentCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn ability(&self, id: &AbilityId) -> Option<Arc<AbilityDefinition>> {
        self.abilities.get(id).cloned()
    }

    pub fn module(&self, id: &ModuleDefId) -> Option<Arc<ModuleDefinition>> {
        self.modules.get(id).cloned()
    }

    pub fn species(&self, id: &SpeciesId) -> Option<Arc<SpeciesDefinition>> {
        self.species.get(id).cloned()
    }

    pub fn ability_count(&self) -> usize {
        self.abilities.len()
    }
}

/// Collects definitions and validates them into a [`ContentCatalog`].
///
/// # Examples
///
/// ```rust
/// use zzcombat::{AbilityDefinition, AbilityKind, ContentCatalog, ModuleDefinition, TargetShape};
///
/// let catalog = ContentCatalog::builder()
///     .ability(AbilityDefinition::new("flare", AbilityKind::Damage, TargetShape::AllEnemies, 30.0))
///     .module(ModuleDefinition::new("ember_core", 100.0, 35.0, 20.0).with_ability("flare"))
///     .build()
///     .unwrap();
/// assert_eq!(catalog.ability_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    abilities: Vec<AbilityDefinition>,
    modules: Vec<ModuleDefinition>,
    species: Vec<SpeciesDefinition>,
}

impl CatalogBuilder {
    pub fn ability(mut self, def: AbilityDefinition) -> Self {
        self.abilities.push(def);
        self
    }

    pub fn module(mut self, def: ModuleDefinition) -> Self {
        self.modules.push(def);
        self
    }

    pub fn species(mut self, def: SpeciesDefinition) -> Self {
        self.species.push(def);
        self
    }

    /// Validate and freeze the catalog.
    pub fn build(self) -> Result<ContentCatalog, ContentError> {
        let mut catalog = ContentCatalog::default();

        for def in self.abilities {
            if catalog.abilities.contains_key(&def.id) {
                return Err(ContentError::DuplicateDefinition(def.id.to_string()));
            }
            catalog.abilities.insert(def.id.clone(), Arc::new(def));
        }

        for def in self.modules {
            if catalog.modules.contains_key(&def.id) {
                return Err(ContentError::DuplicateDefinition(def.id.to_string()));
            }
            if def.firmware_thresholds.iter().any(|&t| t == 0) {
                return Err(ContentError::InvalidThresholds(def.id.to_string()));
            }
            check_abilities(&catalog, def.id.as_str(), &def.abilities)?;
            catalog.modules.insert(def.id.clone(), Arc::new(def));
        }

        for def in self.species {
            if catalog.species.contains_key(&def.id) {
                return Err(ContentError::DuplicateDefinition(def.id.to_string()));
            }
            check_abilities(&catalog, def.id.as_str(), &def.innate_abilities)?;
            catalog.species.insert(def.id.clone(), Arc::new(def));
        }

        Ok(catalog)
    }
}

fn check_abilities(
    catalog: &ContentCatalog,
    owner: &str,
    abilities: &[AbilityId],
) -> Result<(), ContentError> {
    let missing: Vec<String> = abilities
        .iter()
        .filter(|id| !catalog.abilities.contains_key(*id))
        .map(|id| id.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ContentError::UnknownDefinition {
            owner: owner.to_string(),
            missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::{AbilityKind, TargetShape};

    fn bolt() -> AbilityDefinition {
        AbilityDefinition::new("bolt", AbilityKind::Damage, TargetShape::SingleEnemy, 20.0)
    }

    #[test]
    fn test_build_and_lookup() {
        let catalog = ContentCatalog::builder()
            .ability(bolt())
            .species(SpeciesDefinition::new("sparkit").with_ability("bolt"))
            .build()
            .unwrap();
        assert!(catalog.ability(&AbilityId::new("bolt")).is_some());
        assert!(catalog.species(&SpeciesId::new("sparkit")).is_some());
        assert!(catalog.module(&ModuleDefId::new("nope")).is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let result = ContentCatalog::builder().ability(bolt()).ability(bolt()).build();
        assert_eq!(
            result.unwrap_err(),
            ContentError::DuplicateDefinition("bolt".into())
        );
    }

    #[test]
    fn test_unknown_ability_rejected() {
        let result = ContentCatalog::builder()
            .module(ModuleDefinition::new("core", 100.0, 10.0, 10.0).with_ability("ghost"))
            .build();
        assert!(matches!(
            result,
            Err(ContentError::UnknownDefinition { ref missing, .. }) if missing == &vec!["ghost".to_string()]
        ));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let result = ContentCatalog::builder()
            .module(ModuleDefinition::new("core", 100.0, 10.0, 10.0).with_thresholds([5, 0, 5, 5]))
            .build();
        assert_eq!(result.unwrap_err(), ContentError::InvalidThresholds("core".into()));
    }
}
