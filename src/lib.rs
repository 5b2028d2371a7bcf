//! # zzcombat - Tick-Driven ATB Combat Core
//!
//! A combat core for a creature-collection RPG that provides:
//! - **Layered stats** with flat/percent modifiers and a coarse total cache
//! - **Resource modules** with heat, telemetry units (TU) and firmware tiers
//! - **Multi-archetype AI** with boss phases and difficulty scaling
//! - **Tick scheduling** of ATB, energy and heat for every combatant
//!
//! ## Core Concepts
//!
//! ### Stat Pipeline
//!
//! ```text
//! [base] + Σflat → × (1 + Σpercent / 100) → clamp_for(stat) → total
//! ```
//!
//! Percent modifiers are summed before they multiply, and they apply against
//! `base + flat`. Module modifiers are scaled by firmware before they are
//! added, so percentages never compose in sequence.
//!
//! ### Battle Loop
//!
//! 1. Every tick, each combatant's ATB gauge fills and its energy and heat
//!    timers fire on their own cadences
//! 2. Combatants reaching 100% join the ready queue
//! 3. The AI (or the input collaborator) picks an action
//! 4. Resolution mutates targets and feeds the threat table
//! 5. Turn end ticks statuses, cooldowns and timed modifiers, and decays threat
//!
//! ## Example
//!
//! ```rust
//! use zzcombat::*;
//!
//! let mut profile = StatProfile::with_base([(StatType::HpMax, 100.0)]);
//! profile.add_modifier(StatModifier::flat(StatType::HpMax, 20.0));
//! let id = profile.add_modifier(StatModifier::percent(StatType::HpMax, 10.0));
//! assert!((profile.get_total(StatType::HpMax) - 132.0).abs() < 1e-3);
//!
//! profile.remove_modifier(id);
//! assert_eq!(profile.get_total(StatType::HpMax), 120.0);
//! ```
//!
//! ## Modules
//!
//! - [`stat_type`] - Stat channels and clamp table
//! - [`modifier`] - Stat modifiers and their sources
//! - [`profile`] - Cached stat totals
//! - [`module`] - Heat/TU/firmware economy
//! - [`socket`] - Equip-slot topology
//! - [`creature`] - Persistent creatures, evolution and recruitment
//! - [`combatant`] - Combat-only wrapper and turn lifecycle
//! - [`threat`] - Threat table
//! - [`ai`] - Action selection
//! - [`battle`] - Scheduler and action resolution
//! - [`content`] - Injected definition catalog
//! - [`error`] - Error types

pub mod ability;
pub mod action;
pub mod ai;
pub mod battle;
pub mod combatant;
pub mod config;
pub mod content;
pub mod creature;
pub mod error;
pub mod ids;
pub mod modifier;
pub mod module;
pub mod profile;
pub mod socket;
pub mod stat_type;
pub mod status;
pub mod targeting;
pub mod threat;

// Re-export main types for convenience
pub use ability::{AbilityDefinition, AbilityKind, AbilitySource, StatChange, StatusInfliction, TargetShape};
pub use action::{ActionKind, CombatAction};
pub use ai::{Behavior, CombatAi, Difficulty};
pub use battle::{Battle, BattleEvent, BattleOutcome, BattleResult};
pub use combatant::{CombatantState, CombatantView, Controller, Team, TurnPhase};
pub use config::CombatConfig;
pub use content::{CatalogBuilder, ContentCatalog, SocketLayout, SpeciesDefinition};
pub use creature::{
    Creature, CreatureRecord, EvolutionOutcome, EvolutionRule, RecruitOutcome, StoryCallbacks,
    StoryFlags,
};
pub use error::{CombatError, ContentError};
pub use ids::{
    AbilityId, CombatantId, CreatureId, IdGenerator, ModuleDefId, ModuleInstanceId, SequentialIds,
    SpeciesId,
};
pub use modifier::{ModifierId, SourceId, SourceKind, StatModifier};
pub use module::{ModuleDefinition, ModuleRecord, ResourceModule};
pub use profile::{StatBreakdown, StatProfile};
pub use socket::{Socket, SocketConfiguration};
pub use stat_type::{DamageKind, Element, StatType};
pub use status::StatusEffect;
pub use targeting::resolve_targets;
pub use threat::ThreatTable;
