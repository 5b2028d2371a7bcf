//! Combatant state module.
//!
//! `CombatantState` wraps one [`Creature`] for the length of a battle and adds
//! the combat-only fields: ATB gauge, turn phase, energy, status effects,
//! cooldowns and the defending flag.
//!
//! Turn lifecycle:
//!
//! ```text
//! Filling ──gauge≥100 ∧ alive──▶ Ready ──select──▶ ActionChosen ──resolve──▶ Resolved
//!    ▲                                                                          │
//!    └──────────────────────────── gauge = 0 ◀─────────────────────────────────┘
//! ```
//!
//! Energy regeneration and heat dissipation run on their own fixed cadences
//! and keep advancing in every phase.

use crate::ability::{AbilityDefinition, AbilitySource};
use crate::action::CombatAction;
use crate::ai::Behavior;
use crate::config::CombatConfig;
use crate::content::ContentCatalog;
use crate::creature::Creature;
use crate::error::CombatError;
use crate::ids::{AbilityId, CombatantId, ModuleInstanceId};
use crate::modifier::SourceId;
use crate::profile::StatProfile;
use crate::stat_type::StatType;
use crate::status::{StatusEffect, StatusTick};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Highest ATB gauge value; a combatant may act at this value.
pub const ATB_FULL: f32 = 100.0;

/// Which side a combatant fights on.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum Team {
    Player,
    Enemy,
}

impl Team {
    pub fn opponent(self) -> Team {
        match self {
            Team::Player => Team::Enemy,
            Team::Enemy => Team::Player,
        }
    }
}

/// Who picks actions for a combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Controller {
    Ai(Behavior),
    /// An input collaborator submits actions through the battle.
    External,
}

/// Position in the turn lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnPhase {
    Filling,
    Ready,
    ActionChosen,
    Resolved,
}

/// Read-only snapshot for the rendering collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatantView {
    pub id: CombatantId,
    pub name: String,
    pub team: Team,
    pub position: usize,
    pub hp_pct: f32,
    pub atb_pct: f32,
    pub energy: f32,
    pub overheated: Vec<bool>,
    pub defending: bool,
}

/// What the fixed-cadence timers did during one advance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimerReport {
    pub energy_steps: u32,
    pub heat_steps: u32,
    /// Modules that stopped being overheated during this advance.
    pub recovered: Vec<ModuleInstanceId>,
}

/// What happened at a turn end.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnEndReport {
    pub status_damage: i32,
    pub status_healing: i32,
    pub expired_statuses: Vec<StatusEffect>,
    pub expired_modifiers: usize,
}

/// Effects of spending an ability on its source module.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModuleUse {
    pub module: ModuleInstanceId,
    pub heat_added: f32,
    pub overheated: bool,
    pub levels_gained: u8,
    pub firmware_level: u8,
}

/// Combat-only wrapper around a creature.
#[derive(Debug, Clone)]
pub struct CombatantState {
    id: CombatantId,
    team: Team,
    controller: Controller,
    position: usize,
    creature: Creature,
    profile: StatProfile,
    atb_gauge: f32,
    phase: TurnPhase,
    is_defending: bool,
    selected_action: Option<CombatAction>,
    status_effects: BTreeMap<StatusEffect, u32>,
    abilities: Vec<AbilityId>,
    ability_sources: HashMap<AbilityId, AbilitySource>,
    cooldowns: HashMap<AbilityId, u32>,
    energy: f32,
    energy_timer: f32,
    heat_timer: f32,
}

impl CombatantState {
    /// Wrap a creature for a new battle.
    ///
    /// Module heat is reset, the profile is rebuilt from species and
    /// equipment, energy starts full and the gauge starts at
    /// `AtbStartPercent`.
    pub fn new(id: CombatantId, team: Team, controller: Controller, mut creature: Creature) -> Self {
        for module in creature.modules_mut() {
            module.reset_heat();
        }
        let profile = creature.build_profile();
        let mut abilities = Vec::new();
        let mut ability_sources = HashMap::new();
        for (ability, source) in creature.abilities() {
            abilities.push(ability.clone());
            ability_sources.insert(ability, source);
        }
        let energy = profile.get_total(StatType::EnMax);
        let atb_gauge = profile.get_total(StatType::AtbStartPercent);
        let max_hp = profile.get_total(StatType::HpMax) as i32;
        creature.current_hp = creature.current_hp.clamp(0, max_hp);

        Self {
            id,
            team,
            controller,
            position: 0,
            creature,
            profile,
            atb_gauge,
            phase: TurnPhase::Filling,
            is_defending: false,
            selected_action: None,
            status_effects: BTreeMap::new(),
            abilities,
            ability_sources,
            cooldowns: HashMap::new(),
            energy,
            energy_timer: 0.0,
            heat_timer: 0.0,
        }
    }

    pub fn at_position(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    pub fn id(&self) -> CombatantId {
        self.id
    }

    pub fn team(&self) -> Team {
        self.team
    }

    pub fn controller(&self) -> Controller {
        self.controller
    }

    pub fn name(&self) -> &str {
        self.creature.name()
    }

    pub fn creature(&self) -> &Creature {
        &self.creature
    }

    pub fn profile(&self) -> &StatProfile {
        &self.profile
    }

    pub fn profile_mut(&mut self) -> &mut StatProfile {
        &mut self.profile
    }

    pub fn stat(&self, stat: StatType) -> f32 {
        self.profile.get_total(stat)
    }

    pub fn hp(&self) -> i32 {
        self.creature.current_hp
    }

    pub fn max_hp(&self) -> i32 {
        (self.stat(StatType::HpMax) as i32).max(1)
    }

    pub fn hp_fraction(&self) -> f32 {
        self.hp() as f32 / self.max_hp() as f32
    }

    pub fn is_alive(&self) -> bool {
        self.hp() > 0
    }

    pub fn atb_gauge(&self) -> f32 {
        self.atb_gauge
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase == TurnPhase::Ready
    }

    pub fn is_defending(&self) -> bool {
        self.is_defending
    }

    pub fn energy(&self) -> f32 {
        self.energy
    }

    pub fn selected_action(&self) -> Option<&CombatAction> {
        self.selected_action.as_ref()
    }

    pub fn abilities(&self) -> &[AbilityId] {
        &self.abilities
    }

    pub fn ability_source(&self, ability: &AbilityId) -> Option<AbilitySource> {
        self.ability_sources.get(ability).copied()
    }

    pub fn cooldown(&self, ability: &AbilityId) -> u32 {
        self.cooldowns.get(ability).copied().unwrap_or(0)
    }

    pub fn status_effects(&self) -> &BTreeMap<StatusEffect, u32> {
        &self.status_effects
    }

    pub fn has_status(&self, effect: StatusEffect) -> bool {
        self.status_effects.contains_key(&effect)
    }

    /// Stunned or frozen.
    pub fn is_incapacitated(&self) -> bool {
        self.status_effects.keys().any(|e| e.prevents_action())
    }

    /// Advance the ATB gauge and both cadence timers by `dt` seconds.
    ///
    /// Returns `true` when this call moved the combatant into `Ready`.
    pub fn tick(&mut self, dt: f32, config: &CombatConfig) -> (bool, TimerReport) {
        let became_ready = self.update_atb(dt, config);
        let report = self.advance_timers(dt, config);
        (became_ready, report)
    }

    /// `gauge += 20 × (1 + speed / 50) × dt`, clamped to `[0, 100]`.
    ///
    /// Slowed combatants fill at half rate. Returns `true` on the transition
    /// into `Ready`.
    pub fn update_atb(&mut self, dt: f32, config: &CombatConfig) -> bool {
        if !self.is_alive() {
            return false;
        }
        // The fill rate reads speed before its floor of 10, so speed 0 fills at the base rate.
        let mut rate = config.atb_fill_rate(self.profile.get_unclamped(StatType::Speed));
        if self.has_status(StatusEffect::Slow) {
            rate *= 0.5;
        }
        self.atb_gauge = (self.atb_gauge + rate * dt.max(0.0)).clamp(0.0, ATB_FULL);
        if self.phase == TurnPhase::Filling && self.atb_gauge >= ATB_FULL {
            self.phase = TurnPhase::Ready;
            return true;
        }
        false
    }

    /// Run the energy and heat cadences. Independent of the turn phase.
    pub fn advance_timers(&mut self, dt: f32, config: &CombatConfig) -> TimerReport {
        let mut report = TimerReport::default();
        if !self.is_alive() {
            return report;
        }

        self.energy_timer += dt.max(0.0);
        while config.energy_interval > 0.0 && self.energy_timer >= config.energy_interval {
            self.energy_timer -= config.energy_interval;
            let max = self.stat(StatType::EnMax);
            self.energy = (self.energy + self.stat(StatType::EnRegen)).clamp(0.0, max);
            report.energy_steps += 1;
        }

        self.heat_timer += dt.max(0.0);
        while config.heat_interval > 0.0 && self.heat_timer >= config.heat_interval {
            self.heat_timer -= config.heat_interval;
            let dissipation = self.stat(StatType::HeatDissipation);
            let recovery = 1.0 + self.stat(StatType::OverheatRecovery).max(0.0) / 100.0;
            for module in self.creature.modules_mut() {
                let was_overheated = module.is_overheated();
                let factor = if was_overheated {
                    dissipation * recovery
                } else {
                    dissipation
                };
                module.dissipate_heat(config.heat_curve_alpha, factor);
                if was_overheated && !module.is_overheated() {
                    report.recovered.push(module.instance_id());
                }
            }
            report.heat_steps += 1;
        }

        if report.energy_steps > 0 || report.heat_steps > 0 {
            tracing::trace!(
                "{} timers: {} energy step(s), {} heat step(s)",
                self.name(),
                report.energy_steps,
                report.heat_steps
            );
        }
        report
    }

    /// Push the gauge back, reduced by `AtbDelayResist`.
    pub fn delay_atb(&mut self, amount: f32) -> f32 {
        let resist = self.stat(StatType::AtbDelayResist) / 100.0;
        let applied = (amount.max(0.0) * (1.0 - resist)).min(self.atb_gauge);
        self.atb_gauge -= applied;
        if self.phase == TurnPhase::Ready && self.atb_gauge < ATB_FULL {
            self.phase = TurnPhase::Filling;
        }
        applied
    }

    /// Apply incoming damage and return the HP actually lost.
    ///
    /// `actual = max(1, raw − defense / 2)`, halved again while defending
    /// (never below 1). HP floors at 0.
    pub fn take_damage(&mut self, raw: i32) -> i32 {
        let defense = self.stat(StatType::Defense) as i32;
        let mut actual = (raw - defense / 2).max(1);
        if self.is_defending {
            actual = (actual / 2).max(1);
        }
        let before = self.creature.current_hp;
        self.creature.current_hp = (before - actual).max(0);
        if !self.is_alive() {
            self.atb_gauge = 0.0;
            self.phase = TurnPhase::Filling;
            self.selected_action = None;
            self.is_defending = false;
        }
        before - self.creature.current_hp
    }

    /// Restore HP up to max and return the amount restored. Dead combatants
    /// cannot be healed.
    pub fn heal(&mut self, amount: i32) -> i32 {
        if !self.is_alive() {
            return 0;
        }
        let before = self.creature.current_hp;
        self.creature.current_hp = before.saturating_add(amount.max(0)).min(self.max_hp());
        self.creature.current_hp - before
    }

    /// Add a status, keeping the longer duration if already present.
    pub fn apply_status(&mut self, effect: StatusEffect, duration: u32) {
        if duration == 0 || !self.is_alive() {
            return;
        }
        let entry = self.status_effects.entry(effect).or_insert(0);
        *entry = (*entry).max(duration);
    }

    pub fn remove_status(&mut self, effect: StatusEffect) -> bool {
        self.status_effects.remove(&effect).is_some()
    }

    /// Record the chosen action. Reselecting before resolution overwrites.
    pub fn choose_action(&mut self, action: CombatAction) -> Result<(), CombatError> {
        match self.phase {
            TurnPhase::Ready | TurnPhase::ActionChosen => {
                self.selected_action = Some(action);
                self.phase = TurnPhase::ActionChosen;
                Ok(())
            }
            _ => Err(CombatError::NotReady(self.id)),
        }
    }

    pub(crate) fn take_selected_action(&mut self) -> Option<CombatAction> {
        self.selected_action.take()
    }

    pub(crate) fn mark_resolved(&mut self) {
        self.phase = TurnPhase::Resolved;
    }

    /// Reset after acting: the gauge empties and the defending flag is set
    /// from the action just taken, so Defend lasts until the next action.
    pub fn complete_turn(&mut self, defended: bool) {
        self.atb_gauge = 0.0;
        self.is_defending = defended && self.is_alive();
        self.selected_action = None;
        self.phase = TurnPhase::Filling;
    }

    /// Turn-end upkeep: status ticks, status durations, cooldowns and
    /// timed modifiers.
    pub fn end_turn(&mut self) -> TurnEndReport {
        let mut report = TurnEndReport::default();
        let max_hp = self.max_hp();

        let effects: Vec<StatusEffect> = self.status_effects.keys().copied().collect();
        for effect in effects {
            if !self.is_alive() {
                break;
            }
            match effect.tick(max_hp) {
                Some(StatusTick::Damage(amount)) => {
                    let before = self.creature.current_hp;
                    self.creature.current_hp = (before - amount).max(0);
                    report.status_damage += before - self.creature.current_hp;
                }
                Some(StatusTick::Heal(amount)) => {
                    report.status_healing += self.heal(amount);
                }
                None => {}
            }
        }
        if !self.is_alive() {
            self.atb_gauge = 0.0;
            self.phase = TurnPhase::Filling;
            self.is_defending = false;
        }

        self.status_effects.retain(|effect, turns| {
            *turns = turns.saturating_sub(1);
            if *turns == 0 {
                report.expired_statuses.push(*effect);
                false
            } else {
                true
            }
        });

        self.cooldowns.retain(|_, turns| {
            *turns = turns.saturating_sub(1);
            *turns > 0
        });

        report.expired_modifiers = self.profile.tick_durations().len();
        report
    }

    /// Energy an ability costs after `EnCostReduction`.
    pub fn energy_cost(&self, def: &AbilityDefinition) -> u32 {
        let reduction = self.stat(StatType::EnCostReduction).clamp(0.0, 100.0) / 100.0;
        (def.energy_cost as f32 * (1.0 - reduction)).round() as u32
    }

    /// Check that an ability can be used right now.
    pub fn check_ability(&self, def: &AbilityDefinition) -> Result<(), CombatError> {
        if !self.ability_sources.contains_key(&def.id) {
            return Err(CombatError::UnknownAbility(def.id.clone()));
        }
        if self.has_status(StatusEffect::Silence) {
            return Err(CombatError::NotReady(self.id));
        }
        let turns = self.cooldown(&def.id);
        if turns > 0 {
            return Err(CombatError::OnCooldown {
                id: def.id.clone(),
                turns,
            });
        }
        let cost = self.energy_cost(def);
        let available = self.energy.max(0.0) as u32;
        if available < cost {
            return Err(CombatError::InsufficientResource {
                needed: cost,
                available,
            });
        }
        if let Some(AbilitySource::Socket(socket)) = self.ability_source(&def.id) {
            if let Some(module) = self.creature.module(socket) {
                if module.is_overheated() {
                    return Err(CombatError::Overheated(module.instance_id()));
                }
            }
        }
        Ok(())
    }

    /// Abilities usable right now, in kit order.
    pub fn ready_abilities(&self, catalog: &ContentCatalog) -> Vec<Arc<AbilityDefinition>> {
        self.abilities
            .iter()
            .filter_map(|id| catalog.ability(id))
            .filter(|def| self.check_ability(def).is_ok())
            .collect()
    }

    /// Pay for an ability: energy, cooldown, and heat/TU on its source module.
    ///
    /// A firmware level-up re-applies the module's modifiers at the new
    /// multiplier.
    pub fn spend_ability(&mut self, def: &AbilityDefinition) -> Result<Option<ModuleUse>, CombatError> {
        self.check_ability(def)?;
        self.energy -= self.energy_cost(def) as f32;

        if def.cooldown > 0 {
            let cdr = self.stat(StatType::CooldownReduction).clamp(0.0, 100.0) / 100.0;
            let turns = (def.cooldown as f32 * (1.0 - cdr)).ceil() as u32;
            if turns > 0 {
                self.cooldowns.insert(def.id.clone(), turns);
            }
        }

        let Some(AbilitySource::Socket(socket)) = self.ability_source(&def.id) else {
            return Ok(None);
        };
        let generation = self.stat(StatType::HeatGeneration);
        let Some(module) = self.creature.module_mut(socket) else {
            return Ok(None);
        };
        let heat = module.definition().heat_per_use * generation;
        let overheated = module.add_heat(heat);
        let tu = module.definition().tu_per_use;
        let levels_gained = module.add_tu(tu);
        let usage = ModuleUse {
            module: module.instance_id(),
            heat_added: heat,
            overheated,
            levels_gained,
            firmware_level: module.firmware_level(),
        };
        if levels_gained > 0 {
            self.refresh_module_modifiers(socket);
        }
        Ok(Some(usage))
    }

    /// Re-apply a socket's module and link modifiers after its firmware
    /// changed.
    fn refresh_module_modifiers(&mut self, socket: usize) {
        let Some(module) = self.creature.module(socket) else {
            return;
        };
        let source = module.source_id();
        let granted = module.granted_modifiers();
        self.profile.remove_modifiers_from_source(&source);
        for m in granted {
            self.profile.add_modifier(m);
        }

        if let Some(partner) = self.creature.sockets().partner(socket) {
            let link = SourceId::Link {
                first: socket.min(partner),
                second: socket.max(partner),
            };
            self.profile.remove_modifiers_from_source(&link);
            let refreshed: Vec<_> = self
                .creature
                .link_modifiers()
                .into_iter()
                .filter(|m| m.source == link)
                .collect();
            for m in refreshed {
                self.profile.add_modifier(m);
            }
        }
    }

    pub fn view(&self) -> CombatantView {
        CombatantView {
            id: self.id,
            name: self.name().to_string(),
            team: self.team,
            position: self.position,
            hp_pct: self.hp_fraction() * 100.0,
            atb_pct: self.atb_gauge,
            energy: self.energy,
            overheated: self.creature.modules().map(|(_, m)| m.is_overheated()).collect(),
            defending: self.is_defending,
        }
    }

    /// Hand the creature back at battle end. HP carries over; heat does not.
    pub fn into_creature(mut self) -> Creature {
        for module in self.creature.modules_mut() {
            module.reset_heat();
        }
        self.creature
    }
}
