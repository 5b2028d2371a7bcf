//! Combat AI module.
//!
//! `CombatAi` picks an action for a ready combatant from one of seven
//! behavior archetypes. Selection is pure given its inputs and the injected
//! random stream, and always produces a legal action: with no live enemies it
//! defends, and with no usable ability it falls back to a basic attack.
//!
//! The AI also owns the battle's [`ThreatTable`] and the threat hooks that
//! feed it.

use crate::ability::{AbilityDefinition, AbilityKind, TargetShape};
use crate::action::CombatAction;
use crate::combatant::CombatantState;
use crate::config::CombatConfig;
use crate::content::ContentCatalog;
use crate::ids::CombatantId;
use crate::targeting::resolve_targets;
use crate::threat::ThreatTable;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// HP fraction below which a combatant considers itself in danger.
const LOW_HP: f32 = 0.3;
/// HP fraction below which the defensive archetype heals an ally.
const WOUNDED_ALLY: f32 = 0.5;
/// HP fraction below which the balanced archetype may switch to support.
const ALLY_IN_TROUBLE: f32 = 0.4;
const ALLY_RESCUE_CHANCE: f32 = 0.4;
const RANDOM_ATTACK_CHANCE: f32 = 0.7;
const DEFEND_CHANCE: f32 = 0.5;
const SUPPORT_BONUS: f32 = 0.2;
const BOSS_CALM: f32 = 0.7;
const BOSS_SWEEP_CHANCE: f32 = 0.6;

/// Decision archetype.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum Behavior {
    Random,
    Aggressive,
    Defensive,
    Support,
    Balanced,
    ThreatBased,
    /// Phased on the actor's HP fraction.
    Boss,
}

/// Difficulty setting; its dial gates ability usage in every archetype.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
    Nightmare,
}

impl Difficulty {
    pub fn dial(self) -> f32 {
        match self {
            Difficulty::Easy => 0.2,
            Difficulty::Normal => 0.4,
            Difficulty::Hard => 0.6,
            Difficulty::Nightmare => 0.8,
        }
    }
}

/// Everything one decision looks at.
struct Turn<'a> {
    actor: &'a CombatantState,
    allies: &'a [&'a CombatantState],
    enemies: Vec<&'a CombatantState>,
    ready: Vec<Arc<AbilityDefinition>>,
}

/// Behavior-driven action selection plus per-battle threat.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use zzcombat::{CombatAi, ContentCatalog, Difficulty};
/// use zzcombat::ids::CombatantId;
///
/// let mut ai = CombatAi::new(Arc::new(ContentCatalog::default()), Difficulty::Hard);
/// ai.record_damage(CombatantId(1), CombatantId(7), 40);
/// ai.record_healing(CombatantId(2), 30);
/// assert_eq!(ai.threat().threat(CombatantId(1)), 40.0);
/// assert_eq!(ai.threat().threat(CombatantId(2)), 15.0);
///
/// ai.end_turn();
/// assert_eq!(ai.threat().threat_display(CombatantId(1)), 36);
/// ```
#[derive(Debug, Clone)]
pub struct CombatAi {
    catalog: Arc<ContentCatalog>,
    difficulty: Difficulty,
    threat: ThreatTable,
    threat_decay: f32,
    healing_threat_factor: f32,
}

impl CombatAi {
    pub fn new(catalog: Arc<ContentCatalog>, difficulty: Difficulty) -> Self {
        Self {
            catalog,
            difficulty,
            threat: ThreatTable::new(),
            threat_decay: CombatConfig::DEFAULT_THREAT_DECAY,
            healing_threat_factor: CombatConfig::DEFAULT_HEALING_THREAT_FACTOR,
        }
    }

    /// Take threat tunables from a battle config.
    pub fn with_config(mut self, config: &CombatConfig) -> Self {
        self.threat_decay = config.threat_decay;
        self.healing_threat_factor = config.healing_threat_factor;
        self
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulty = difficulty;
    }

    pub fn threat(&self) -> &ThreatTable {
        &self.threat
    }

    /// Damage dealt adds the same amount of threat to its source.
    pub fn record_damage(&mut self, source: CombatantId, _target: CombatantId, damage: i32) {
        self.threat.add_threat(source, damage as f32);
    }

    /// Healing adds half its amount as threat by default.
    pub fn record_healing(&mut self, source: CombatantId, healed: i32) {
        self.threat
            .add_threat(source, healed as f32 * self.healing_threat_factor);
    }

    /// Turn-end threat decay.
    pub fn end_turn(&mut self) {
        self.threat.decay(self.threat_decay);
    }

    /// Forget all threat for a new encounter.
    pub fn reset(&mut self) {
        self.threat.clear();
    }

    /// Pick an action for `actor`.
    ///
    /// `allies` excludes the actor. Dead combatants in either list are never
    /// targeted.
    pub fn select_action<R: Rng + ?Sized>(
        &self,
        actor: &CombatantState,
        allies: &[&CombatantState],
        enemies: &[&CombatantState],
        behavior: Behavior,
        rng: &mut R,
    ) -> CombatAction {
        let live: Vec<&CombatantState> = enemies.iter().copied().filter(|c| c.is_alive()).collect();
        if live.is_empty() {
            tracing::debug!("{} has no live enemies, defending", actor.name());
            return CombatAction::defend(actor.id());
        }

        let turn = Turn {
            actor,
            allies,
            enemies: live,
            ready: actor.ready_abilities(&self.catalog),
        };
        let action = self.decide(&turn, behavior, rng);
        tracing::debug!(
            "{} ({:?}) chose {:?} on {:?}",
            actor.name(),
            behavior,
            action.kind,
            action.targets
        );
        action
    }

    fn decide<R: Rng + ?Sized>(&self, turn: &Turn<'_>, behavior: Behavior, rng: &mut R) -> CombatAction {
        match behavior {
            Behavior::Random => self.random(turn, rng),
            Behavior::Aggressive => self.aggressive(turn, rng),
            Behavior::Defensive => self.defensive(turn, rng),
            Behavior::Support => self.support(turn, rng),
            Behavior::Balanced => self.balanced(turn, rng),
            Behavior::ThreatBased => self.threat_based(turn, rng),
            Behavior::Boss => self.boss(turn, rng),
        }
    }

    fn random<R: Rng + ?Sized>(&self, turn: &Turn<'_>, rng: &mut R) -> CombatAction {
        if rng.gen::<f32>() < RANDOM_ATTACK_CHANCE {
            return attack_random(turn, rng);
        }
        match turn.ready.choose(rng).cloned() {
            Some(def) => use_or_attack(turn, &def, None, rng),
            None => attack_random(turn, rng),
        }
    }

    fn aggressive<R: Rng + ?Sized>(&self, turn: &Turn<'_>, rng: &mut R) -> CombatAction {
        let target = lowest_hp_fraction(&turn.enemies);
        if rng.gen::<f32>() < self.difficulty.dial() {
            if let Some(def) = strongest(&turn.ready) {
                return use_or_attack(turn, &def, Some(target.id()), rng);
            }
        }
        CombatAction::attack(turn.actor.id(), target.id())
    }

    fn defensive<R: Rng + ?Sized>(&self, turn: &Turn<'_>, rng: &mut R) -> CombatAction {
        let actor = turn.actor;
        if actor.hp_fraction() < LOW_HP {
            if let Some(heal) = turn.ready.iter().find(|a| a.is_self_heal()) {
                if let Some(action) = use_ability(turn, heal, Some(actor.id()), rng) {
                    return action;
                }
            }
            if rng.gen::<f32>() < DEFEND_CHANCE {
                return CombatAction::defend(actor.id());
            }
        }

        let wounded = turn
            .allies
            .iter()
            .copied()
            .filter(|a| a.is_alive() && a.hp_fraction() < WOUNDED_ALLY)
            .fold(None::<&CombatantState>, |best, a| match best {
                Some(b) if b.hp_fraction() <= a.hp_fraction() => Some(b),
                _ => Some(a),
            });
        if let Some(ally) = wounded {
            if let Some(heal) = turn.ready.iter().find(|a| a.is_ally_heal()) {
                if let Some(action) = use_ability(turn, heal, Some(ally.id()), rng) {
                    return action;
                }
            }
        }

        let target = lowest_hp(&turn.enemies);
        CombatAction::attack(actor.id(), target.id())
    }

    fn support<R: Rng + ?Sized>(&self, turn: &Turn<'_>, rng: &mut R) -> CombatAction {
        if rng.gen::<f32>() < self.difficulty.dial() + SUPPORT_BONUS {
            let support: Vec<&Arc<AbilityDefinition>> =
                turn.ready.iter().filter(|a| a.kind.is_support()).collect();
            if let Some(def) = support.choose(rng) {
                if let Some(action) = use_ability(turn, def, None, rng) {
                    return action;
                }
            }
        }
        attack_random(turn, rng)
    }

    fn balanced<R: Rng + ?Sized>(&self, turn: &Turn<'_>, rng: &mut R) -> CombatAction {
        if turn.actor.hp_fraction() < LOW_HP {
            return self.defensive(turn, rng);
        }
        let ally_in_trouble = turn
            .allies
            .iter()
            .any(|a| a.is_alive() && a.hp_fraction() < ALLY_IN_TROUBLE);
        if ally_in_trouble && rng.gen::<f32>() < ALLY_RESCUE_CHANCE {
            return self.defensive(turn, rng);
        }
        self.aggressive(turn, rng)
    }

    fn threat_based<R: Rng + ?Sized>(&self, turn: &Turn<'_>, rng: &mut R) -> CombatAction {
        let target = self
            .threat
            .get_highest(&turn.enemies)
            .unwrap_or(turn.enemies[0]);
        if rng.gen::<f32>() < self.difficulty.dial() {
            if let Some(def) = strongest(&turn.ready) {
                return use_or_attack(turn, &def, Some(target.id()), rng);
            }
        }
        CombatAction::attack(turn.actor.id(), target.id())
    }

    fn boss<R: Rng + ?Sized>(&self, turn: &Turn<'_>, rng: &mut R) -> CombatAction {
        let hp = turn.actor.hp_fraction();
        if hp > BOSS_CALM {
            return self.balanced(turn, rng);
        }
        if hp >= LOW_HP {
            if rng.gen::<f32>() < BOSS_SWEEP_CHANCE {
                let sweep = turn
                    .ready
                    .iter()
                    .find(|a| a.target == TargetShape::AllEnemies)
                    .cloned();
                if let Some(def) = sweep {
                    if let Some(action) = use_ability(turn, &def, None, rng) {
                        return action;
                    }
                }
            }
            return self.aggressive(turn, rng);
        }

        // Execute phase: no roll.
        let target = lowest_hp(&turn.enemies);
        match strongest(&turn.ready) {
            Some(def) => use_or_attack(turn, &def, Some(target.id()), rng),
            None => CombatAction::attack(turn.actor.id(), target.id()),
        }
    }
}

/// Highest-power ready Damage ability; ties keep kit order.
fn strongest(ready: &[Arc<AbilityDefinition>]) -> Option<Arc<AbilityDefinition>> {
    ready
        .iter()
        .filter(|a| a.kind == AbilityKind::Damage)
        .fold(None::<&Arc<AbilityDefinition>>, |best, a| match best {
            Some(b) if b.power >= a.power => Some(b),
            _ => Some(a),
        })
        .cloned()
}

fn lowest_hp_fraction<'a>(enemies: &[&'a CombatantState]) -> &'a CombatantState {
    enemies
        .iter()
        .copied()
        .reduce(|best, c| if c.hp_fraction() < best.hp_fraction() { c } else { best })
        .unwrap_or(enemies[0])
}

fn lowest_hp<'a>(enemies: &[&'a CombatantState]) -> &'a CombatantState {
    enemies
        .iter()
        .copied()
        .reduce(|best, c| if c.hp() < best.hp() { c } else { best })
        .unwrap_or(enemies[0])
}

fn attack_random<R: Rng + ?Sized>(turn: &Turn<'_>, rng: &mut R) -> CombatAction {
    let target = turn.enemies.choose(rng).copied().unwrap_or(turn.enemies[0]);
    CombatAction::attack(turn.actor.id(), target.id())
}

fn use_ability<R: Rng + ?Sized>(
    turn: &Turn<'_>,
    def: &AbilityDefinition,
    preferred: Option<CombatantId>,
    rng: &mut R,
) -> Option<CombatAction> {
    match resolve_targets(def.target, turn.actor, turn.allies, &turn.enemies, preferred, rng) {
        Ok(targets) => Some(CombatAction::ability(turn.actor.id(), def.id.clone(), targets)),
        Err(e) => {
            tracing::debug!("{} cannot use {}: {}", turn.actor.name(), def.name, e);
            None
        }
    }
}

fn use_or_attack<R: Rng + ?Sized>(
    turn: &Turn<'_>,
    def: &AbilityDefinition,
    preferred: Option<CombatantId>,
    rng: &mut R,
) -> CombatAction {
    if let Some(action) = use_ability(turn, def, preferred, rng) {
        return action;
    }
    let target = preferred
        .and_then(|p| turn.enemies.iter().find(|e| e.id() == p))
        .copied()
        .unwrap_or(turn.enemies[0]);
    tracing::warn!("{} falls back to a basic attack", turn.actor.name());
    CombatAction::attack(turn.actor.id(), target.id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_dials() {
        assert_eq!(Difficulty::Easy.dial(), 0.2);
        assert_eq!(Difficulty::Normal.dial(), 0.4);
        assert_eq!(Difficulty::Hard.dial(), 0.6);
        assert_eq!(Difficulty::Nightmare.dial(), 0.8);
        assert_eq!(Difficulty::default(), Difficulty::Normal);
    }

    #[test]
    fn test_threat_hooks() {
        let mut ai = CombatAi::new(Arc::new(ContentCatalog::default()), Difficulty::Normal);
        ai.record_damage(CombatantId(1), CombatantId(2), 50);
        ai.record_damage(CombatantId(3), CombatantId(2), 80);
        ai.end_turn();
        assert_eq!(ai.threat().threat_display(CombatantId(1)), 45);
        assert_eq!(ai.threat().threat_display(CombatantId(3)), 72);
        ai.reset();
        assert!(ai.threat().is_empty());
    }

    #[test]
    fn test_strongest_prefers_first_on_tie() {
        let ready = vec![
            Arc::new(AbilityDefinition::new("a", AbilityKind::Damage, TargetShape::SingleEnemy, 20.0)),
            Arc::new(AbilityDefinition::new("b", AbilityKind::Heal, TargetShape::SelfOnly, 99.0)),
            Arc::new(AbilityDefinition::new("c", AbilityKind::Damage, TargetShape::SingleEnemy, 20.0)),
        ];
        let pick = strongest(&ready).unwrap();
        assert_eq!(pick.id.as_str(), "a");
        assert!(strongest(&ready[1..2]).is_none());
    }
}
