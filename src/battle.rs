//! Battle module.
//!
//! A `Battle` owns every combatant, the AI (with its threat table) and the
//! battle's random stream. [`Battle::tick`] is the scheduler: it advances
//! every combatant's ATB, energy and heat timers, then resolves the actions of
//! combatants that became ready. A combatant driven by an external input
//! collaborator waits in the ready queue until a command arrives through the
//! `select_*`/`confirm_target` entry points; nobody else's timers stop while
//! it waits.
//!
//! Every mutating call returns the list of [`BattleEvent`]s it produced
//! instead of notifying subscribers.

use crate::ability::{AbilityDefinition, AbilityKind, StatusInfliction, TargetShape};
use crate::action::{ActionKind, CombatAction};
use crate::ai::{CombatAi, Difficulty};
use crate::combatant::{CombatantState, CombatantView, Controller, Team};
use crate::config::CombatConfig;
use crate::content::ContentCatalog;
use crate::creature::{recruit_chance, Creature, RecruitOutcome, StoryFlags};
use crate::error::CombatError;
use crate::ids::{AbilityId, CombatantId, IdGenerator, ModuleInstanceId, SequentialIds};
use crate::modifier::{SourceId, StatModifier};
use crate::module::firmware_multiplier;
use crate::stat_type::{DamageKind, StatType};
use crate::status::StatusEffect;
use crate::targeting::resolve_targets;
use crate::threat::ThreatTable;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::VecDeque;
use std::sync::Arc;

/// Power of a basic attack before the attacker's attack stat.
pub const BASIC_ATTACK_POWER: f32 = 10.0;

/// Lowest hit chance in percent, whatever the evasion.
pub const MIN_HIT_CHANCE: f32 = 5.0;

/// Highest mitigation in percent.
pub const MAX_MITIGATION: f32 = 90.0;

/// Story flag that unlocks recruitment.
pub const RECRUIT_FLAG: &str = "recruitment_unlocked";

/// How a battle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleOutcome {
    Victory,
    Defeat,
    Fled,
}

/// Something that happened during a tick or an input call.
#[derive(Debug, Clone, PartialEq)]
pub enum BattleEvent {
    TurnReady { id: CombatantId },
    ActionChosen { id: CombatantId, action: CombatAction },
    /// Stunned or frozen when the turn came up.
    TurnSkipped { id: CombatantId, effect: StatusEffect },
    /// The chosen action could not run and a safe default replaced it.
    ActionFailed { id: CombatantId, error: CombatError },
    AbilityUsed {
        source: CombatantId,
        ability: AbilityId,
        targets: Vec<CombatantId>,
    },
    Missed { source: CombatantId, target: CombatantId },
    Damaged {
        source: CombatantId,
        target: CombatantId,
        amount: i32,
        critical: bool,
    },
    Healed {
        source: CombatantId,
        target: CombatantId,
        amount: i32,
    },
    ModifierApplied {
        target: CombatantId,
        stat: StatType,
        value: f32,
        is_percent: bool,
        turns: u32,
    },
    StatusApplied {
        target: CombatantId,
        effect: StatusEffect,
        turns: u32,
    },
    StatusResisted { target: CombatantId, effect: StatusEffect },
    StatusTicked {
        id: CombatantId,
        damage: i32,
        healing: i32,
    },
    StatusExpired { id: CombatantId, effect: StatusEffect },
    Defending { id: CombatantId },
    Defeated { id: CombatantId },
    ModuleOverheated { id: CombatantId, module: ModuleInstanceId },
    ModuleCooled { id: CombatantId, module: ModuleInstanceId },
    FirmwareLevelUp {
        id: CombatantId,
        module: ModuleInstanceId,
        level: u8,
    },
    FleeBlocked { id: CombatantId },
    FleeFailed { id: CombatantId },
    Fled { id: CombatantId },
    BattleEnded { outcome: BattleOutcome },
}

/// Creatures handed back when a battle is torn down.
#[derive(Debug)]
pub struct BattleResult {
    pub outcome: Option<BattleOutcome>,
    pub party: Vec<Creature>,
    pub enemies: Vec<Creature>,
    pub recruited: Vec<Creature>,
}

#[derive(Debug, Clone, PartialEq)]
enum PendingKind {
    Attack,
    Ability(AbilityId),
}

/// Half-built command from the input collaborator.
#[derive(Debug, Clone, PartialEq)]
struct PendingCommand {
    actor: CombatantId,
    kind: PendingKind,
    target: Option<CombatantId>,
}

enum Strike {
    Miss,
    Hit { raw: i32, critical: bool },
}

/// One battle instance.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use zzcombat::{
///     AbilityDefinition, AbilityKind, Battle, BattleOutcome, Behavior, CombatConfig,
///     ContentCatalog, Controller, Creature, Difficulty, SpeciesDefinition, StatType,
///     TargetShape, Team,
/// };
/// use zzcombat::ids::CreatureId;
///
/// let catalog = Arc::new(
///     ContentCatalog::builder()
///         .ability(AbilityDefinition::new("bite", AbilityKind::Damage, TargetShape::SingleEnemy, 12.0))
///         .species(
///             SpeciesDefinition::new("wolf")
///                 .with_stat(StatType::HpMax, 60.0)
///                 .with_stat(StatType::MeleeAttack, 15.0)
///                 .with_stat(StatType::Speed, 30.0)
///                 .with_ability("bite"),
///         )
///         .species(SpeciesDefinition::new("slime").with_stat(StatType::HpMax, 20.0))
///         .build()
///         .unwrap(),
/// );
///
/// let wolf = Creature::new(CreatureId(1), catalog.species(&"wolf".into()).unwrap()).unwrap();
/// let slime = Creature::new(CreatureId(2), catalog.species(&"slime".into()).unwrap()).unwrap();
///
/// let mut battle = Battle::new(CombatConfig::default(), catalog, Difficulty::Normal, 7);
/// battle.add_combatant(Team::Player, Controller::Ai(Behavior::Aggressive), wolf);
/// battle.add_combatant(Team::Enemy, Controller::Ai(Behavior::Random), slime);
///
/// battle.run(0.1, 10_000);
/// assert_eq!(battle.outcome(), Some(BattleOutcome::Victory));
/// ```
#[derive(Debug)]
pub struct Battle {
    config: CombatConfig,
    catalog: Arc<ContentCatalog>,
    combatants: Vec<CombatantState>,
    ai: CombatAi,
    rng: StdRng,
    ready_queue: VecDeque<CombatantId>,
    pending: Option<PendingCommand>,
    outcome: Option<BattleOutcome>,
    recruited: Vec<Creature>,
    elapsed: f32,
    ids: Box<dyn IdGenerator>,
}

impl Battle {
    /// Start an empty battle with a seeded random stream.
    pub fn new(config: CombatConfig, catalog: Arc<ContentCatalog>, difficulty: Difficulty, seed: u64) -> Self {
        let ai = CombatAi::new(catalog.clone(), difficulty).with_config(&config);
        Self {
            config,
            catalog,
            combatants: Vec::new(),
            ai,
            rng: StdRng::seed_from_u64(seed),
            ready_queue: VecDeque::new(),
            pending: None,
            outcome: None,
            recruited: Vec::new(),
            elapsed: 0.0,
            ids: Box::new(SequentialIds::new()),
        }
    }

    /// Hand out combatant ids from `ids` instead of counting from 0.
    ///
    /// The generator must not repeat ids within one battle.
    pub fn with_ids(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// Wrap a creature and add it to a side.
    pub fn add_combatant(&mut self, team: Team, controller: Controller, creature: Creature) -> CombatantId {
        let id = self.ids.next_combatant_id();
        let position = self.combatants.iter().filter(|c| c.team() == team).count();
        self.combatants
            .push(CombatantState::new(id, team, controller, creature).at_position(position));
        id
    }

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    pub fn outcome(&self) -> Option<BattleOutcome> {
        self.outcome
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn threat(&self) -> &ThreatTable {
        self.ai.threat()
    }

    pub fn combatants(&self) -> &[CombatantState] {
        &self.combatants
    }

    pub fn combatant(&self, id: CombatantId) -> Option<&CombatantState> {
        self.combatants.iter().find(|c| c.id() == id)
    }

    pub fn combatant_mut(&mut self, id: CombatantId) -> Option<&mut CombatantState> {
        self.combatants.iter_mut().find(|c| c.id() == id)
    }

    pub fn ready_queue(&self) -> impl Iterator<Item = CombatantId> + '_ {
        self.ready_queue.iter().copied()
    }

    /// A battle against any boss cannot be fled from.
    pub fn is_boss_battle(&self) -> bool {
        self.combatants
            .iter()
            .any(|c| c.team() == Team::Enemy && c.creature().species().is_boss)
    }

    /// View state for the rendering collaborator.
    pub fn views(&self) -> Vec<CombatantView> {
        self.combatants.iter().map(|c| c.view()).collect()
    }

    fn index_of(&self, id: CombatantId) -> Result<usize, CombatError> {
        self.combatants
            .iter()
            .position(|c| c.id() == id)
            .ok_or(CombatError::UnknownCombatant(id))
    }

    /// Advance the battle by `dt` seconds.
    pub fn tick(&mut self, dt: f32) -> Vec<BattleEvent> {
        let mut events = Vec::new();
        if self.outcome.is_some() {
            return events;
        }
        self.check_outcome(&mut events);
        if self.outcome.is_some() {
            return events;
        }
        self.elapsed += dt.max(0.0);

        for c in &mut self.combatants {
            let (became_ready, report) = c.tick(dt, &self.config);
            for module in report.recovered {
                events.push(BattleEvent::ModuleCooled { id: c.id(), module });
            }
            if became_ready {
                tracing::debug!("{} is ready", c.name());
                self.ready_queue.push_back(c.id());
                events.push(BattleEvent::TurnReady { id: c.id() });
            }
        }

        self.process_ready(&mut events);
        events
    }

    /// Tick until the battle ends, input is needed, or `max_ticks` elapse.
    pub fn run(&mut self, dt: f32, max_ticks: usize) -> Vec<BattleEvent> {
        let mut events = Vec::new();
        for _ in 0..max_ticks {
            if self.outcome.is_some() || self.awaiting_input().is_some() {
                break;
            }
            events.extend(self.tick(dt));
        }
        events
    }

    fn process_ready(&mut self, events: &mut Vec<BattleEvent>) {
        let combatants = &self.combatants;
        self.ready_queue.retain(|id| {
            combatants
                .iter()
                .any(|c| c.id() == *id && c.is_alive())
        });

        let queued: Vec<CombatantId> = self.ready_queue.iter().copied().collect();
        let mut acting: Vec<(CombatantId, i32)> = Vec::new();
        for id in queued {
            let Ok(idx) = self.index_of(id) else { continue };
            if self.combatants[idx].is_incapacitated() {
                acting.push((id, 0));
                continue;
            }
            match self.combatants[idx].controller() {
                Controller::Ai(behavior) => {
                    if self.combatants[idx].selected_action().is_none() {
                        let action = {
                            let (actor, allies, enemies) = sides(&self.combatants, idx);
                            self.ai
                                .select_action(actor, &allies, &enemies, behavior, &mut self.rng)
                        };
                        if let Err(e) = self.combatants[idx].choose_action(action.clone()) {
                            tracing::warn!("dropping AI choice: {}", e);
                            continue;
                        }
                        events.push(BattleEvent::ActionChosen { id, action });
                    }
                }
                Controller::External => {
                    if self.combatants[idx].selected_action().is_none() {
                        continue;
                    }
                }
            }
            let priority = self.combatants[idx]
                .selected_action()
                .map(|a| a.priority)
                .unwrap_or(0);
            acting.push((id, priority));
        }
        acting.sort_by_key(|&(_, priority)| Reverse(priority));

        for (id, _) in acting {
            if self.outcome.is_some() {
                break;
            }
            let Ok(idx) = self.index_of(id) else { continue };
            self.ready_queue.retain(|q| *q != id);
            if !self.combatants[idx].is_alive() {
                continue;
            }
            self.take_turn(idx, events);
            self.check_outcome(events);
        }
    }

    fn take_turn(&mut self, idx: usize, events: &mut Vec<BattleEvent>) {
        let id = self.combatants[idx].id();
        if self.pending.as_ref().is_some_and(|p| p.actor == id) {
            self.pending = None;
        }
        let action = self.combatants[idx].take_selected_action();
        let skipped = self.combatants[idx]
            .status_effects()
            .keys()
            .copied()
            .find(|e| e.prevents_action());

        match (skipped, action) {
            (Some(effect), _) => {
                tracing::debug!("{} is {} and loses the turn", self.combatants[idx].name(), effect);
                events.push(BattleEvent::TurnSkipped { id, effect });
                self.combatants[idx].complete_turn(false);
            }
            (None, Some(action)) => {
                self.combatants[idx].mark_resolved();
                self.resolve(idx, action, events);
            }
            (None, None) => {
                self.combatants[idx].complete_turn(false);
            }
        }
        if self.outcome.is_none() {
            self.end_turn(idx, events);
        }
    }

    fn resolve(&mut self, idx: usize, action: CombatAction, events: &mut Vec<BattleEvent>) {
        tracing::debug!(
            "{} resolves {:?} on {:?}",
            self.combatants[idx].name(),
            action.kind,
            action.targets
        );
        match action.kind {
            ActionKind::Defend => {
                events.push(BattleEvent::Defending { id: action.source });
                self.combatants[idx].complete_turn(true);
            }
            ActionKind::Flee => self.resolve_flee(idx, events),
            ActionKind::Attack => {
                self.resolve_attack(idx, action.targets.first().copied(), events);
            }
            ActionKind::Ability(ability) => {
                self.resolve_ability(idx, &ability, &action.targets, events);
            }
        }
    }

    fn resolve_attack(&mut self, idx: usize, preferred: Option<CombatantId>, events: &mut Vec<BattleEvent>) {
        let Some(target) = self.live_enemy(idx, preferred) else {
            self.substitute_defend(idx, CombatError::InvalidTarget, events);
            return;
        };
        self.strike(idx, target, BASIC_ATTACK_POWER, DamageKind::Melee, events);
        self.combatants[idx].complete_turn(false);
    }

    fn resolve_ability(
        &mut self,
        idx: usize,
        ability: &AbilityId,
        chosen: &[CombatantId],
        events: &mut Vec<BattleEvent>,
    ) {
        let id = self.combatants[idx].id();
        let Some(def) = self.catalog.ability(ability) else {
            self.fallback_attack(idx, CombatError::UnknownAbility(ability.clone()), chosen, events);
            return;
        };
        if let Err(e) = self.combatants[idx].check_ability(&def) {
            self.fallback_attack(idx, e, chosen, events);
            return;
        }
        let targets = match self.retarget(idx, &def, chosen) {
            Ok(t) => t,
            Err(e) => {
                self.substitute_defend(idx, e, events);
                return;
            }
        };
        let usage = match self.combatants[idx].spend_ability(&def) {
            Ok(u) => u,
            Err(e) => {
                self.fallback_attack(idx, e, chosen, events);
                return;
            }
        };

        events.push(BattleEvent::AbilityUsed {
            source: id,
            ability: def.id.clone(),
            targets: targets.clone(),
        });
        let multiplier = match usage {
            Some(u) => {
                if u.overheated {
                    events.push(BattleEvent::ModuleOverheated { id, module: u.module });
                }
                if u.levels_gained > 0 {
                    tracing::debug!("module {} reached firmware {}", u.module, u.firmware_level);
                    events.push(BattleEvent::FirmwareLevelUp {
                        id,
                        module: u.module,
                        level: u.firmware_level,
                    });
                }
                firmware_multiplier(u.firmware_level)
            }
            None => 1.0,
        };

        for target in targets {
            let Ok(t) = self.index_of(target) else { continue };
            if !self.combatants[t].is_alive() {
                continue;
            }
            let landed = match def.kind {
                AbilityKind::Damage => self
                    .strike(idx, t, def.power * multiplier, def.damage_kind, events)
                    .is_some(),
                AbilityKind::Heal => {
                    self.heal(idx, t, def.power * multiplier, events);
                    true
                }
                AbilityKind::Buff | AbilityKind::Debuff | AbilityKind::Status => true,
            };
            if !landed || !self.combatants[t].is_alive() {
                continue;
            }
            self.apply_stat_changes(idx, t, &def, multiplier, events);
            if let Some(infliction) = def.status {
                self.inflict(idx, t, infliction, events);
            }
        }
        self.combatants[idx].complete_turn(false);
    }

    /// Re-expand targets at resolution time so nothing already dead is hit.
    fn retarget(
        &mut self,
        idx: usize,
        def: &AbilityDefinition,
        chosen: &[CombatantId],
    ) -> Result<Vec<CombatantId>, CombatError> {
        let preferred = chosen.iter().copied().find(|id| {
            self.combatant(*id)
                .map(|c| c.is_alive())
                .unwrap_or(false)
        });
        let (actor, allies, enemies) = sides(&self.combatants, idx);
        resolve_targets(def.target, actor, &allies, &enemies, preferred, &mut self.rng)
    }

    fn resolve_flee(&mut self, idx: usize, events: &mut Vec<BattleEvent>) {
        let id = self.combatants[idx].id();
        if self.combatants[idx].team() == Team::Enemy || self.is_boss_battle() {
            tracing::warn!("{} cannot flee, defending instead", self.combatants[idx].name());
            events.push(BattleEvent::FleeBlocked { id });
            events.push(BattleEvent::Defending { id });
            self.combatants[idx].complete_turn(true);
            return;
        }
        let luck = self.combatants[idx].stat(StatType::Luck);
        let chance = (self.config.flee_base_chance + luck / 200.0).clamp(0.0, 1.0);
        if self.rng.gen::<f32>() < chance {
            events.push(BattleEvent::Fled { id });
            self.combatants[idx].complete_turn(false);
            self.end_battle(BattleOutcome::Fled, events);
        } else {
            events.push(BattleEvent::FleeFailed { id });
            self.combatants[idx].complete_turn(false);
        }
    }

    /// Hit roll, crit roll and mitigation, then `take_damage`.
    ///
    /// Returns the HP removed, or `None` on a miss.
    fn strike(
        &mut self,
        attacker: usize,
        target: usize,
        power: f32,
        kind: DamageKind,
        events: &mut Vec<BattleEvent>,
    ) -> Option<i32> {
        let roll = roll_strike(
            &self.combatants[attacker],
            &self.combatants[target],
            power,
            kind,
            &mut self.rng,
        );
        let source = self.combatants[attacker].id();
        let target_id = self.combatants[target].id();
        match roll {
            Strike::Miss => {
                events.push(BattleEvent::Missed {
                    source,
                    target: target_id,
                });
                None
            }
            Strike::Hit { raw, critical } => {
                let dealt = self.combatants[target].take_damage(raw);
                self.ai.record_damage(source, target_id, dealt);
                events.push(BattleEvent::Damaged {
                    source,
                    target: target_id,
                    amount: dealt,
                    critical,
                });
                if !self.combatants[target].is_alive() {
                    tracing::debug!("{} is defeated", self.combatants[target].name());
                    self.ready_queue.retain(|q| *q != target_id);
                    events.push(BattleEvent::Defeated { id: target_id });
                }
                Some(dealt)
            }
        }
    }

    fn heal(&mut self, healer: usize, target: usize, power: f32, events: &mut Vec<BattleEvent>) {
        let bonus = 1.0 + self.combatants[target].stat(StatType::HealingReceived) / 100.0;
        let amount = (power * bonus).round().max(0.0) as i32;
        let healed = self.combatants[target].heal(amount);
        let source = self.combatants[healer].id();
        self.ai.record_healing(source, healed);
        events.push(BattleEvent::Healed {
            source,
            target: self.combatants[target].id(),
            amount: healed,
        });
    }

    /// Timed modifiers from an ability. Recasting refreshes rather than stacks.
    fn apply_stat_changes(
        &mut self,
        caster: usize,
        target: usize,
        def: &AbilityDefinition,
        multiplier: f32,
        events: &mut Vec<BattleEvent>,
    ) {
        if def.stat_changes.is_empty() {
            return;
        }
        let source = SourceId::Ability {
            caster: self.combatants[caster].id(),
            ability: def.id.clone(),
        };
        let target_id = self.combatants[target].id();
        let profile = self.combatants[target].profile_mut();
        profile.remove_modifiers_from_source(&source);
        for change in &def.stat_changes {
            let value = change.value * multiplier;
            let turns = change.duration.max(1);
            let modifier = if change.is_percent {
                StatModifier::percent(change.stat, value)
            } else {
                StatModifier::flat(change.stat, value)
            };
            profile.add_modifier(
                modifier
                    .with_source(source.clone(), def.name.clone())
                    .lasting(turns),
            );
            events.push(BattleEvent::ModifierApplied {
                target: target_id,
                stat: change.stat,
                value,
                is_percent: change.is_percent,
                turns,
            });
        }
    }

    /// Status roll: `base + application − resistance`, clamped to [0, 100].
    fn inflict(
        &mut self,
        caster: usize,
        target: usize,
        infliction: StatusInfliction,
        events: &mut Vec<BattleEvent>,
    ) {
        let chance = status_chance(&self.combatants[caster], &self.combatants[target], infliction);
        let target_id = self.combatants[target].id();
        if self.rng.gen::<f32>() * 100.0 < chance {
            self.combatants[target].apply_status(infliction.effect, infliction.duration);
            events.push(BattleEvent::StatusApplied {
                target: target_id,
                effect: infliction.effect,
                turns: infliction.duration,
            });
        } else {
            events.push(BattleEvent::StatusResisted {
                target: target_id,
                effect: infliction.effect,
            });
        }
    }

    fn fallback_attack(
        &mut self,
        idx: usize,
        error: CombatError,
        chosen: &[CombatantId],
        events: &mut Vec<BattleEvent>,
    ) {
        let id = self.combatants[idx].id();
        tracing::warn!("{} falls back to a basic attack: {}", self.combatants[idx].name(), error);
        events.push(BattleEvent::ActionFailed { id, error });
        let preferred = chosen.iter().copied().find(|t| {
            self.combatant(*t)
                .map(|c| c.team() != self.combatants[idx].team())
                .unwrap_or(false)
        });
        self.resolve_attack(idx, preferred, events);
    }

    fn substitute_defend(&mut self, idx: usize, error: CombatError, events: &mut Vec<BattleEvent>) {
        let id = self.combatants[idx].id();
        tracing::warn!("{} defends instead: {}", self.combatants[idx].name(), error);
        events.push(BattleEvent::ActionFailed { id, error });
        events.push(BattleEvent::Defending { id });
        self.combatants[idx].complete_turn(true);
    }

    /// The preferred target if it is a live opponent, else a random one.
    fn live_enemy(&mut self, idx: usize, preferred: Option<CombatantId>) -> Option<usize> {
        let team = self.combatants[idx].team();
        if let Some(p) = preferred {
            if let Ok(t) = self.index_of(p) {
                let c = &self.combatants[t];
                if c.is_alive() && c.team() != team {
                    return Some(t);
                }
            }
        }
        let live: Vec<usize> = self
            .combatants
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_alive() && c.team() != team)
            .map(|(i, _)| i)
            .collect();
        live.choose(&mut self.rng).copied()
    }

    fn end_turn(&mut self, idx: usize, events: &mut Vec<BattleEvent>) {
        let id = self.combatants[idx].id();
        let was_alive = self.combatants[idx].is_alive();
        let report = self.combatants[idx].end_turn();
        if report.status_damage > 0 || report.status_healing > 0 {
            events.push(BattleEvent::StatusTicked {
                id,
                damage: report.status_damage,
                healing: report.status_healing,
            });
        }
        for effect in report.expired_statuses {
            events.push(BattleEvent::StatusExpired { id, effect });
        }
        if was_alive && !self.combatants[idx].is_alive() {
            self.ready_queue.retain(|q| *q != id);
            events.push(BattleEvent::Defeated { id });
        }
        self.ai.end_turn();
    }

    fn check_outcome(&mut self, events: &mut Vec<BattleEvent>) {
        if self.outcome.is_some() {
            return;
        }
        let alive = |team: Team| {
            self.combatants
                .iter()
                .any(|c| c.team() == team && c.is_alive())
        };
        let outcome = if !alive(Team::Enemy) {
            BattleOutcome::Victory
        } else if !alive(Team::Player) {
            BattleOutcome::Defeat
        } else {
            return;
        };
        self.end_battle(outcome, events);
    }

    fn end_battle(&mut self, outcome: BattleOutcome, events: &mut Vec<BattleEvent>) {
        tracing::debug!("battle ended: {:?} after {:.1}s", outcome, self.elapsed);
        self.outcome = Some(outcome);
        self.ready_queue.clear();
        self.pending = None;
        self.ai.reset();
        events.push(BattleEvent::BattleEnded { outcome });
    }

    /// The first queued external combatant still waiting for a command.
    pub fn awaiting_input(&self) -> Option<CombatantId> {
        self.ready_queue.iter().copied().find(|id| {
            self.combatant(*id).is_some_and(|c| {
                c.controller() == Controller::External
                    && c.is_alive()
                    && !c.is_incapacitated()
                    && c.selected_action().is_none()
            })
        })
    }

    fn input_actor(&self) -> Result<CombatantId, CombatError> {
        if self.outcome.is_some() {
            return Err(CombatError::NoPendingInput);
        }
        self.awaiting_input().ok_or(CombatError::NoPendingInput)
    }

    /// Start a basic attack; a target may follow through [`Battle::select_target`].
    pub fn select_attack(&mut self) -> Result<(), CombatError> {
        let actor = self.input_actor()?;
        self.pending = Some(PendingCommand {
            actor,
            kind: PendingKind::Attack,
            target: None,
        });
        Ok(())
    }

    /// Start an ability from the waiting combatant's kit by index.
    ///
    /// Fails without changing the pending command if the ability cannot be
    /// used right now.
    pub fn select_ability(&mut self, index: usize) -> Result<(), CombatError> {
        let actor = self.input_actor()?;
        let idx = self.index_of(actor)?;
        let ability = self.combatants[idx]
            .abilities()
            .get(index)
            .cloned()
            .ok_or(CombatError::NoSuchAbilitySlot(index))?;
        let def = self
            .catalog
            .ability(&ability)
            .ok_or_else(|| CombatError::UnknownAbility(ability.clone()))?;
        self.combatants[idx].check_ability(&def)?;
        self.pending = Some(PendingCommand {
            actor,
            kind: PendingKind::Ability(ability),
            target: None,
        });
        Ok(())
    }

    /// Pick the target of the pending command.
    ///
    /// Group shapes ignore the target; single shapes require a live target
    /// on the right side.
    pub fn select_target(&mut self, target: CombatantId) -> Result<(), CombatError> {
        let pending = self.pending.clone().ok_or(CombatError::NoPendingInput)?;
        let actor = self.combatant(pending.actor).ok_or(CombatError::UnknownCombatant(pending.actor))?;
        let candidate = self.combatant(target).ok_or(CombatError::UnknownCombatant(target))?;
        let shape = match &pending.kind {
            PendingKind::Attack => TargetShape::SingleEnemy,
            PendingKind::Ability(id) => self
                .catalog
                .ability(id)
                .map(|d| d.target)
                .ok_or_else(|| CombatError::UnknownAbility(id.clone()))?,
        };
        let legal = match shape {
            TargetShape::SingleEnemy | TargetShape::RandomEnemy => {
                candidate.is_alive() && candidate.team() != actor.team()
            }
            TargetShape::SingleAlly => candidate.is_alive() && candidate.team() == actor.team(),
            _ => true,
        };
        if !legal {
            return Err(CombatError::InvalidTarget);
        }
        if let Some(p) = self.pending.as_mut() {
            p.target = Some(target);
        }
        Ok(())
    }

    /// Turn the pending command into the combatant's chosen action.
    ///
    /// It resolves on the next tick.
    pub fn confirm_target(&mut self) -> Result<CombatAction, CombatError> {
        let pending = self.pending.clone().ok_or(CombatError::NoPendingInput)?;
        let idx = self.index_of(pending.actor)?;
        let action = match pending.kind {
            PendingKind::Attack => {
                let target = match pending.target {
                    Some(t) => t,
                    None => {
                        let t = self
                            .live_enemy(idx, None)
                            .ok_or(CombatError::InvalidTarget)?;
                        self.combatants[t].id()
                    }
                };
                CombatAction::attack(pending.actor, target)
            }
            PendingKind::Ability(ability) => {
                let def = self
                    .catalog
                    .ability(&ability)
                    .ok_or_else(|| CombatError::UnknownAbility(ability.clone()))?;
                let targets = {
                    let (actor, allies, enemies) = sides(&self.combatants, idx);
                    resolve_targets(def.target, actor, &allies, &enemies, pending.target, &mut self.rng)?
                };
                CombatAction::ability(pending.actor, ability, targets)
            }
        };
        self.combatants[idx].choose_action(action.clone())?;
        self.pending = None;
        Ok(action)
    }

    pub fn select_defend(&mut self) -> Result<(), CombatError> {
        let actor = self.input_actor()?;
        self.submit_action(CombatAction::defend(actor))
    }

    pub fn select_flee(&mut self) -> Result<(), CombatError> {
        let actor = self.input_actor()?;
        self.submit_action(CombatAction::flee(actor))
    }

    /// Drop a half-built command.
    pub fn cancel_selection(&mut self) {
        self.pending = None;
    }

    /// Hand a complete action to a ready combatant. Overwrites any earlier
    /// choice that has not resolved yet.
    pub fn submit_action(&mut self, action: CombatAction) -> Result<(), CombatError> {
        let idx = self.index_of(action.source)?;
        self.combatants[idx].choose_action(action)?;
        self.pending = None;
        Ok(())
    }

    /// Try to recruit an enemy. A recruited enemy leaves the battle at once.
    pub fn attempt_recruit(
        &mut self,
        target: CombatantId,
        story: &dyn StoryFlags,
    ) -> Result<RecruitOutcome, CombatError> {
        let idx = self.index_of(target)?;
        let c = &self.combatants[idx];
        let impossible = |reason: &str| {
            Ok(RecruitOutcome::Impossible {
                reason: reason.to_string(),
            })
        };
        if c.team() != Team::Enemy {
            return impossible("only enemies can be recruited");
        }
        if !c.is_alive() {
            return impossible("target is down");
        }
        if c.creature().species().is_boss {
            return impossible("bosses cannot be recruited");
        }
        if !story.has_flag(RECRUIT_FLAG) {
            return impossible("recruitment is locked");
        }

        let luck = self
            .combatants
            .iter()
            .filter(|p| p.team() == Team::Player && p.is_alive())
            .map(|p| p.stat(StatType::Luck))
            .fold(0.0_f32, f32::max);
        let chance = recruit_chance(c.creature().species(), c.hp_fraction(), luck);
        if self.rng.gen::<f32>() * 100.0 >= chance {
            return Ok(RecruitOutcome::Refused {
                reason: format!("{} refused ({chance:.0}% chance)", c.name()),
            });
        }

        let state = self.combatants.remove(idx);
        self.ready_queue.retain(|q| *q != target);
        tracing::debug!("{} joins the party", state.name());
        self.recruited.push(state.into_creature());
        Ok(RecruitOutcome::Recruited)
    }

    /// Tear the battle down and hand creatures back. Module heat is reset.
    pub fn finish(mut self) -> BattleResult {
        self.ai.reset();
        let mut party = Vec::new();
        let mut enemies = Vec::new();
        for c in self.combatants {
            match c.team() {
                Team::Player => party.push(c.into_creature()),
                Team::Enemy => enemies.push(c.into_creature()),
            }
        }
        BattleResult {
            outcome: self.outcome,
            party,
            enemies,
            recruited: self.recruited,
        }
    }
}

/// Split the roster into actor, allies (actor excluded) and opponents.
fn sides(combatants: &[CombatantState], idx: usize) -> (&CombatantState, Vec<&CombatantState>, Vec<&CombatantState>) {
    let actor = &combatants[idx];
    let allies = combatants
        .iter()
        .enumerate()
        .filter(|(i, c)| *i != idx && c.team() == actor.team())
        .map(|(_, c)| c)
        .collect();
    let enemies = combatants
        .iter()
        .filter(|c| c.team() != actor.team())
        .collect();
    (actor, allies, enemies)
}

fn roll_strike<R: Rng + ?Sized>(
    attacker: &CombatantState,
    target: &CombatantState,
    power: f32,
    kind: DamageKind,
    rng: &mut R,
) -> Strike {
    let mut accuracy = attacker.stat(kind.accuracy_stat());
    if attacker.has_status(StatusEffect::Blind) {
        accuracy -= StatusEffect::BLIND_ACCURACY_PENALTY;
    }
    let hit_chance = (accuracy - target.stat(StatType::Evasion)).clamp(MIN_HIT_CHANCE, 100.0);
    if rng.gen::<f32>() * 100.0 >= hit_chance {
        return Strike::Miss;
    }

    let mut raw = power + attacker.stat(kind.attack_stat());
    let critical = rng.gen::<f32>() * 100.0 < attacker.stat(StatType::CritChance);
    if critical {
        raw *= attacker.stat(StatType::CritSeverity) / 100.0;
    }
    let mitigation = (target.stat(kind.mitigation_stat()) - attacker.stat(kind.penetration_stat()))
        .clamp(0.0, MAX_MITIGATION);
    raw *= 1.0 - mitigation / 100.0;
    Strike::Hit {
        raw: raw.round().max(0.0) as i32,
        critical,
    }
}

fn status_chance(caster: &CombatantState, target: &CombatantState, infliction: StatusInfliction) -> f32 {
    let modifier = match infliction.effect.application_pair() {
        Some((application, resistance)) => caster.stat(application) - target.stat(resistance),
        None => 0.0,
    };
    (infliction.chance + modifier).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::Behavior;
    use crate::content::SpeciesDefinition;
    use crate::ids::CreatureId;
    use rand::rngs::mock::StepRng;

    fn catalog() -> Arc<ContentCatalog> {
        Arc::new(
            ContentCatalog::builder()
                .ability(AbilityDefinition::new("bite", AbilityKind::Damage, TargetShape::SingleEnemy, 10.0))
                .species(
                    SpeciesDefinition::new("pup")
                        .with_stat(StatType::HpMax, 100.0)
                        .with_stat(StatType::MeleeAttack, 10.0)
                        .with_stat(StatType::MeleeAccuracy, 100.0)
                        .with_stat(StatType::Defense, 10.0)
                        .with_ability("bite"),
                )
                .build()
                .unwrap(),
        )
    }

    fn pup(catalog: &ContentCatalog, id: u64) -> Creature {
        Creature::new(CreatureId(id), catalog.species(&"pup".into()).unwrap()).unwrap()
    }

    #[test]
    fn test_strike_formula() {
        let catalog = catalog();
        let a = CombatantState::new(CombatantId(0), Team::Player, Controller::External, pup(&catalog, 0));
        let t = CombatantState::new(CombatantId(1), Team::Enemy, Controller::External, pup(&catalog, 1));
        let mut rng = StepRng::new(0, 0);
        match roll_strike(&a, &t, 10.0, DamageKind::Melee, &mut rng) {
            Strike::Hit { raw, critical } => {
                assert_eq!(raw, 20);
                assert!(!critical);
            }
            Strike::Miss => panic!("roll of 0 must hit"),
        }
    }

    #[test]
    fn test_positions_per_team() {
        let catalog = catalog();
        let mut battle = Battle::new(CombatConfig::default(), catalog.clone(), Difficulty::Normal, 1);
        battle.add_combatant(Team::Player, Controller::External, pup(&catalog, 0));
        battle.add_combatant(Team::Enemy, Controller::Ai(Behavior::Random), pup(&catalog, 1));
        battle.add_combatant(Team::Player, Controller::External, pup(&catalog, 2));
        let views = battle.views();
        assert_eq!(views[0].position, 0);
        assert_eq!(views[1].position, 0);
        assert_eq!(views[2].position, 1);
    }

    #[test]
    fn test_external_combatant_waits_without_blocking_timers() {
        let catalog = catalog();
        let mut battle = Battle::new(CombatConfig::default(), catalog.clone(), Difficulty::Normal, 1);
        let hero = battle.add_combatant(Team::Player, Controller::External, pup(&catalog, 0));
        let foe = battle.add_combatant(Team::Enemy, Controller::External, pup(&catalog, 1));

        // No speed: 20 gauge/s, ready after ~5s.
        for _ in 0..60 {
            battle.tick(0.1);
        }
        assert_eq!(battle.awaiting_input(), Some(hero));
        let foe_gauge = battle.combatant(foe).unwrap().atb_gauge();
        assert_eq!(foe_gauge, 100.0);

        battle.select_attack().unwrap();
        battle.select_target(foe).unwrap();
        battle.confirm_target().unwrap();
        let events = battle.tick(0.1);
        assert!(events
            .iter()
            .any(|e| matches!(e, BattleEvent::Damaged { source, target, .. } if *source == hero && *target == foe)));
        assert_eq!(battle.combatant(hero).unwrap().atb_gauge(), 0.0);
        assert_eq!(battle.awaiting_input(), Some(foe));
    }
}
