//! Resource module module.
//!
//! A `ResourceModule` is an equippable unit with three resources:
//!
//! - **Heat**: added on use, dissipated on a fixed cadence, combat-scoped.
//! - **TU** (telemetry units): earned on use, drives firmware level-ups.
//! - **Firmware level** (1..=5): scales every modifier the module grants.
//!
//! Heat may overflow past `heat_max` up to `1.5 × heat_max`. Everything at or
//! above `heat_max` counts as overheated, so the overflow is a lockout buffer
//! that must cool down before the module is usable again.

use crate::content::ContentCatalog;
use crate::ids::{AbilityId, ModuleDefId, ModuleInstanceId};
use crate::modifier::{SourceId, StatModifier};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Highest firmware level.
pub const MAX_FIRMWARE_LEVEL: u8 = 5;

/// Ceiling on heat, relative to `heat_max`.
pub const HEAT_CEILING_FACTOR: f32 = 1.5;

/// Effect multiplier per firmware level (index 0 is level 1).
pub const FIRMWARE_MULTIPLIERS: [f32; 5] = [1.0, 1.15, 1.35, 1.6, 2.0];

/// Immutable module content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    pub id: ModuleDefId,
    pub name: String,
    pub heat_max: f32,
    /// Heat generated per use, before the owner's `HeatGeneration` scaling.
    pub heat_per_use: f32,
    /// Cooling per dissipation step at zero heat (`C0`).
    pub cooling_rate: f32,
    pub tu_per_use: u32,
    /// TU needed for the transitions 1→2, 2→3, 3→4 and 4→5.
    pub firmware_thresholds: [u32; 4],
    /// Modifiers granted while equipped, at firmware level 1.
    pub modifiers: Vec<StatModifier>,
    /// Modifiers granted when this module sits in a linked pair next to
    /// another module.
    pub link_bonus: Vec<StatModifier>,
    pub abilities: Vec<AbilityId>,
}

impl ModuleDefinition {
    pub fn new(id: &str, heat_max: f32, heat_per_use: f32, cooling_rate: f32) -> Self {
        Self {
            id: ModuleDefId::new(id),
            name: id.to_string(),
            heat_max,
            heat_per_use,
            cooling_rate,
            tu_per_use: 10,
            firmware_thresholds: [100, 250, 500, 1000],
            modifiers: Vec::new(),
            link_bonus: Vec::new(),
            abilities: Vec::new(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: [u32; 4]) -> Self {
        self.firmware_thresholds = thresholds;
        self
    }

    pub fn with_tu_per_use(mut self, tu: u32) -> Self {
        self.tu_per_use = tu;
        self
    }

    pub fn with_modifier(mut self, modifier: StatModifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn with_link_bonus(mut self, modifier: StatModifier) -> Self {
        self.link_bonus.push(modifier);
        self
    }

    pub fn with_ability(mut self, ability: &str) -> Self {
        self.abilities.push(AbilityId::new(ability));
        self
    }
}

/// Persisted shape of a module. Heat is deliberately absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub instance_id: ModuleInstanceId,
    pub definition_id: ModuleDefId,
    pub firmware_level: u8,
    pub current_tu: u32,
    pub equipped_socket: Option<usize>,
}

/// A persistent module instance.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use zzcombat::{ModuleDefinition, ResourceModule};
/// use zzcombat::ids::ModuleInstanceId;
///
/// let def = Arc::new(ModuleDefinition::new("ember_core", 100.0, 40.0, 20.0));
/// let mut module = ResourceModule::new(ModuleInstanceId(1), def);
///
/// module.add_heat(130.0);
/// assert!(module.is_overheated());
/// assert_eq!(module.current_heat(), 130.0);
///
/// module.add_heat(100.0);
/// assert_eq!(module.current_heat(), 150.0); // 1.5 × heat_max
/// ```
#[derive(Debug, Clone)]
pub struct ResourceModule {
    instance_id: ModuleInstanceId,
    definition: Arc<ModuleDefinition>,
    firmware_level: u8,
    current_tu: u32,
    current_heat: f32,
    equipped_socket: Option<usize>,
}

impl ResourceModule {
    pub fn new(instance_id: ModuleInstanceId, definition: Arc<ModuleDefinition>) -> Self {
        Self {
            instance_id,
            definition,
            firmware_level: 1,
            current_tu: 0,
            current_heat: 0.0,
            equipped_socket: None,
        }
    }

    pub fn instance_id(&self) -> ModuleInstanceId {
        self.instance_id
    }

    pub fn definition(&self) -> &ModuleDefinition {
        &self.definition
    }

    pub fn firmware_level(&self) -> u8 {
        self.firmware_level
    }

    pub fn current_tu(&self) -> u32 {
        self.current_tu
    }

    pub fn current_heat(&self) -> f32 {
        self.current_heat
    }

    pub fn equipped_socket(&self) -> Option<usize> {
        self.equipped_socket
    }

    pub(crate) fn set_equipped_socket(&mut self, socket: Option<usize>) {
        self.equipped_socket = socket;
    }

    pub fn heat_ceiling(&self) -> f32 {
        HEAT_CEILING_FACTOR * self.definition.heat_max
    }

    /// Add heat, saturating at the overflow ceiling.
    ///
    /// Returns `true` if this call pushed the module into overheat.
    pub fn add_heat(&mut self, generated: f32) -> bool {
        let was = self.is_overheated();
        self.current_heat = (self.current_heat + generated.max(0.0)).min(self.heat_ceiling());
        !was && self.is_overheated()
    }

    /// Run one dissipation step and return how much heat was removed.
    ///
    /// `cool = C0 × dissipation / (1 + α × (heat / heat_max)²)`. Cooling is
    /// fast near zero and slow near the ceiling.
    pub fn dissipate_heat(&mut self, alpha: f32, dissipation: f32) -> f32 {
        if self.current_heat <= 0.0 {
            return 0.0;
        }
        let ratio = self.current_heat / self.definition.heat_max.max(f32::EPSILON);
        let cool = self.definition.cooling_rate * dissipation / (1.0 + alpha * ratio * ratio);
        let before = self.current_heat;
        self.current_heat = (self.current_heat - cool).max(0.0);
        before - self.current_heat
    }

    pub fn is_overheated(&self) -> bool {
        self.current_heat >= self.definition.heat_max
    }

    /// Clear heat at combat start.
    pub fn reset_heat(&mut self) {
        self.current_heat = 0.0;
    }

    /// Accumulate TU and apply every level-up it pays for.
    ///
    /// Returns the number of levels gained. Firmware never drops and stops
    /// at [`MAX_FIRMWARE_LEVEL`]; TU keeps accumulating past the last level.
    pub fn add_tu(&mut self, amount: u32) -> u8 {
        self.current_tu = self.current_tu.saturating_add(amount);
        let mut gained = 0;
        while self.firmware_level < MAX_FIRMWARE_LEVEL {
            let threshold = self.definition.firmware_thresholds[(self.firmware_level - 1) as usize];
            if self.current_tu < threshold {
                break;
            }
            self.current_tu -= threshold;
            self.firmware_level += 1;
            gained += 1;
        }
        gained
    }

    pub fn effect_multiplier(&self) -> f32 {
        firmware_multiplier(self.firmware_level)
    }

    /// The definition's modifiers scaled by firmware and tagged with this
    /// instance as their source.
    pub fn granted_modifiers(&self) -> Vec<StatModifier> {
        let mult = self.effect_multiplier();
        self.definition
            .modifiers
            .iter()
            .map(|m| {
                m.scaled(mult)
                    .with_source(self.source_id(), self.definition.name.clone())
            })
            .collect()
    }

    pub fn source_id(&self) -> SourceId {
        SourceId::Module(self.instance_id)
    }

    pub fn to_record(&self) -> ModuleRecord {
        ModuleRecord {
            instance_id: self.instance_id,
            definition_id: self.definition.id.clone(),
            firmware_level: self.firmware_level,
            current_tu: self.current_tu,
            equipped_socket: self.equipped_socket,
        }
    }

    /// Rebuild a module from its record. Heat starts at zero.
    ///
    /// Returns `None` if the catalog does not know the definition.
    pub fn from_record(record: &ModuleRecord, catalog: &ContentCatalog) -> Option<Self> {
        let definition = catalog.module(&record.definition_id)?;
        Some(Self {
            instance_id: record.instance_id,
            definition,
            firmware_level: record.firmware_level.clamp(1, MAX_FIRMWARE_LEVEL),
            current_tu: record.current_tu,
            current_heat: 0.0,
            equipped_socket: record.equipped_socket,
        })
    }
}

/// Effect multiplier for a firmware level; out-of-range levels clamp.
pub fn firmware_multiplier(level: u8) -> f32 {
    let idx = level.clamp(1, MAX_FIRMWARE_LEVEL) as usize - 1;
    FIRMWARE_MULTIPLIERS[idx]
}
