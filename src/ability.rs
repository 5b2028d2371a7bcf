//! Ability definitions.
//!
//! Abilities are immutable content loaded into the
//! [`ContentCatalog`](crate::ContentCatalog). A combatant refers to them by
//! [`AbilityId`] and remembers where each one came from ([`AbilitySource`]).

use crate::ids::AbilityId;
use crate::stat_type::{DamageKind, StatType};
use crate::status::StatusEffect;
use serde::{Deserialize, Serialize};

/// What an ability does when it resolves.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityKind {
    Damage,
    Heal,
    Buff,
    Debuff,
    Status,
}

impl AbilityKind {
    /// Kinds the support archetype prefers.
    pub fn is_support(self) -> bool {
        matches!(self, AbilityKind::Buff | AbilityKind::Debuff | AbilityKind::Status)
    }
}

/// Declared target shape, expanded to concrete targets by
/// [`resolve_targets`](crate::targeting::resolve_targets).
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetShape {
    SelfOnly,
    SingleEnemy,
    AllEnemies,
    SingleAlly,
    AllAllies,
    RandomEnemy,
    All,
}

impl TargetShape {
    /// Shapes that name exactly one target.
    pub fn is_single(self) -> bool {
        matches!(
            self,
            TargetShape::SingleEnemy | TargetShape::SingleAlly | TargetShape::RandomEnemy
        )
    }

    /// Shapes that can reach the caster or its side.
    pub fn is_friendly(self) -> bool {
        matches!(
            self,
            TargetShape::SelfOnly | TargetShape::SingleAlly | TargetShape::AllAllies
        )
    }
}

/// Where a combatant's ability came from.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilitySource {
    /// Granted by the module in this socket.
    Socket(usize),
    /// Part of the species kit.
    Innate,
    /// Learned before the socket system existed; kept for old saves.
    Legacy,
}

/// A status an ability may inflict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusInfliction {
    pub effect: StatusEffect,
    /// Base chance in percent, before application/resistance.
    pub chance: f32,
    pub duration: u32,
}

/// A timed stat change an ability applies to its targets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatChange {
    pub stat: StatType,
    pub value: f32,
    pub is_percent: bool,
    pub duration: u32,
}

/// Immutable ability content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityDefinition {
    pub id: AbilityId,
    pub name: String,
    pub kind: AbilityKind,
    pub target: TargetShape,
    /// Damage or healing before scaling; ranks damage abilities for the AI.
    pub power: f32,
    pub damage_kind: DamageKind,
    pub energy_cost: u32,
    /// Turns before the ability is ready again after use.
    pub cooldown: u32,
    pub stat_changes: Vec<StatChange>,
    pub status: Option<StatusInfliction>,
}

impl AbilityDefinition {
    /// Start a definition with sensible defaults: melee, no cost, no cooldown.
    pub fn new(id: &str, kind: AbilityKind, target: TargetShape, power: f32) -> Self {
        Self {
            id: AbilityId::new(id),
            name: id.to_string(),
            kind,
            target,
            power,
            damage_kind: DamageKind::Melee,
            energy_cost: 0,
            cooldown: 0,
            stat_changes: Vec::new(),
            status: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_cost(mut self, energy: u32) -> Self {
        self.energy_cost = energy;
        self
    }

    pub fn with_cooldown(mut self, turns: u32) -> Self {
        self.cooldown = turns;
        self
    }

    pub fn with_damage_kind(mut self, kind: DamageKind) -> Self {
        self.damage_kind = kind;
        self
    }

    pub fn with_stat_change(mut self, change: StatChange) -> Self {
        self.stat_changes.push(change);
        self
    }

    pub fn with_status(mut self, status: StatusInfliction) -> Self {
        self.status = Some(status);
        self
    }

    /// A heal that can land on the caster.
    pub fn is_self_heal(&self) -> bool {
        self.kind == AbilityKind::Heal && self.target.is_friendly()
    }

    /// A heal that can land on another ally.
    pub fn is_ally_heal(&self) -> bool {
        self.kind == AbilityKind::Heal
            && matches!(self.target, TargetShape::SingleAlly | TargetShape::AllAllies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stat_type::Element;

    #[test]
    fn test_builder() {
        let a = AbilityDefinition::new("flare", AbilityKind::Damage, TargetShape::AllEnemies, 30.0)
            .named("Flare")
            .with_cost(12)
            .with_cooldown(2)
            .with_damage_kind(DamageKind::Elemental(Element::Fire));
        assert_eq!(a.name, "Flare");
        assert_eq!(a.energy_cost, 12);
        assert_eq!(a.cooldown, 2);
        assert!(!a.target.is_single());
    }

    #[test]
    fn test_heal_classification() {
        let mend = AbilityDefinition::new("mend", AbilityKind::Heal, TargetShape::SelfOnly, 20.0);
        assert!(mend.is_self_heal());
        assert!(!mend.is_ally_heal());

        let pulse = AbilityDefinition::new("pulse", AbilityKind::Heal, TargetShape::SingleAlly, 20.0);
        assert!(pulse.is_self_heal());
        assert!(pulse.is_ally_heal());
    }
}
