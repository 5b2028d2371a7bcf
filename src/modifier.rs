//! Stat modifier module.
//!
//! A `StatModifier` is a single flat or percent bonus tagged with the source
//! that granted it. Modifiers are owned by the [`StatProfile`](crate::StatProfile)
//! they were added to and removed either individually (by [`ModifierId`]) or
//! in bulk by [`SourceId`] when their source goes away.

use crate::ids::{AbilityId, CombatantId, ModuleInstanceId};
use crate::stat_type::StatType;
use serde::{Deserialize, Serialize};

/// Handle to a modifier inside one profile.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModifierId(pub u64);

/// What granted a modifier. Used for bulk removal.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceId {
    /// An equipped resource module.
    Module(ModuleInstanceId),
    /// A linked socket pair holding two modules.
    Link { first: usize, second: usize },
    /// A timed effect cast by a combatant.
    Ability {
        caster: CombatantId,
        ability: AbilityId,
    },
    /// Species or creature-intrinsic bonuses.
    Innate,
    /// Anything else the host game tags by number.
    Custom(u64),
}

/// Coarse grouping of sources, for display and filtering.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Equipment,
    Link,
    Ability,
    Innate,
    Other,
}

impl SourceId {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceId::Module(_) => SourceKind::Equipment,
            SourceId::Link { .. } => SourceKind::Link,
            SourceId::Ability { .. } => SourceKind::Ability,
            SourceId::Innate => SourceKind::Innate,
            SourceId::Custom(_) => SourceKind::Other,
        }
    }
}

/// A single bonus to one stat channel.
///
/// # Examples
///
/// ```rust
/// use zzcombat::{SourceId, StatModifier, StatType};
///
/// let m = StatModifier::percent(StatType::Speed, 15.0)
///     .with_source(SourceId::Innate, "Swift")
///     .lasting(3);
/// assert!(m.is_percent);
/// assert_eq!(m.duration, Some(3));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatModifier {
    /// Assigned by the owning profile on insertion.
    pub id: Option<ModifierId>,
    pub stat: StatType,
    pub value: f32,
    /// `value` is a percentage (10.0 = +10%) rather than a flat amount.
    pub is_percent: bool,
    pub source: SourceId,
    pub source_kind: SourceKind,
    pub source_name: String,
    /// Remaining turns; `None` is permanent.
    pub duration: Option<u32>,
}

impl StatModifier {
    /// Create a flat modifier with an anonymous source.
    pub fn flat(stat: StatType, value: f32) -> Self {
        Self::new(stat, value, false)
    }

    /// Create a percent modifier with an anonymous source.
    pub fn percent(stat: StatType, value: f32) -> Self {
        Self::new(stat, value, true)
    }

    fn new(stat: StatType, value: f32, is_percent: bool) -> Self {
        Self {
            id: None,
            stat,
            value,
            is_percent,
            source: SourceId::Custom(0),
            source_kind: SourceKind::Other,
            source_name: String::new(),
            duration: None,
        }
    }

    /// Tag the modifier with its source.
    pub fn with_source(mut self, source: SourceId, name: impl Into<String>) -> Self {
        self.source_kind = source.kind();
        self.source = source;
        self.source_name = name.into();
        self
    }

    /// Make the modifier expire after `turns` owner turn-ends.
    pub fn lasting(mut self, turns: u32) -> Self {
        self.duration = Some(turns);
        self
    }

    /// Return a copy with the value multiplied by `factor`.
    ///
    /// Used for firmware scaling: the value is scaled before it is added,
    /// so percent modifiers still stack additively.
    pub fn scaled(&self, factor: f32) -> Self {
        let mut m = self.clone();
        m.value *= factor;
        m
    }
}
