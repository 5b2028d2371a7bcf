//! Stat profile module.
//!
//! Provides the `StatProfile` type: base values per channel plus the active
//! modifier set. Totals are computed lazily and cached.
//!
//! ```text
//! total = clamp((base + Σflat) × (1 + Σpercent / 100))
//! ```
//!
//! Percent modifiers sum before multiplying and apply against `base + flat`.
//!
//! Cache invalidation is coarse on purpose: any change to a base value or to
//! the modifier set clears every cached total. Profiles hold a few dozen
//! modifiers at most, so recomputing one channel on the next read is cheaper
//! than tracking per-channel dirtiness.

use crate::modifier::{ModifierId, SourceId, StatModifier};
use crate::stat_type::StatType;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;

/// Full breakdown of how a total was computed.
///
/// Read-only and copyable; intended for debugging and tooltips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatBreakdown {
    pub stat: StatType,
    pub base: f32,
    pub flat: f32,
    /// Sum of percent modifiers (10.0 = +10%).
    pub percent: f32,
    /// `(base + flat) × (1 + percent / 100)` before clamping.
    pub unclamped: f32,
    /// The value `get_total` returns.
    pub total: f32,
    /// Each contributing modifier as `(source_name, value, is_percent)`,
    /// in insertion order.
    pub contributions: Vec<(String, f32, bool)>,
}

/// Base values plus active modifiers for one combatant.
///
/// # Examples
///
/// ```rust
/// use zzcombat::{StatModifier, StatProfile, StatType};
///
/// let mut profile = StatProfile::new();
/// profile.set_base(StatType::HpMax, 100.0);
/// profile.add_modifier(StatModifier::flat(StatType::HpMax, 20.0));
/// profile.add_modifier(StatModifier::percent(StatType::HpMax, 10.0));
///
/// assert!((profile.get_total(StatType::HpMax) - 132.0).abs() < 1e-3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StatProfile {
    base: HashMap<StatType, f32>,
    modifiers: Vec<StatModifier>,
    next_modifier_id: u64,
    cache: RefCell<HashMap<StatType, f32>>,
}

impl StatProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a profile from a set of base values.
    pub fn with_base(values: impl IntoIterator<Item = (StatType, f32)>) -> Self {
        let mut profile = Self::new();
        for (stat, value) in values {
            profile.base.insert(stat, value);
        }
        profile
    }

    /// Base value for a channel, falling back to the channel default.
    pub fn base(&self, stat: StatType) -> f32 {
        self.base
            .get(&stat)
            .copied()
            .unwrap_or_else(|| stat.default_base())
    }

    /// Set a base value. Invalidates the whole cache.
    pub fn set_base(&mut self, stat: StatType, value: f32) {
        self.base.insert(stat, value);
        self.invalidate_all();
    }

    /// Add a modifier and return the id assigned to it.
    ///
    /// Invalidates the whole cache.
    pub fn add_modifier(&mut self, mut modifier: StatModifier) -> ModifierId {
        let id = ModifierId(self.next_modifier_id);
        self.next_modifier_id += 1;
        modifier.id = Some(id);
        self.modifiers.push(modifier);
        self.invalidate_all();
        id
    }

    /// Remove one modifier by id. Invalidates the whole cache.
    pub fn remove_modifier(&mut self, id: ModifierId) -> Option<StatModifier> {
        let pos = self.modifiers.iter().position(|m| m.id == Some(id))?;
        let removed = self.modifiers.remove(pos);
        self.invalidate_all();
        Some(removed)
    }

    /// Remove every modifier granted by `source`, returning how many were
    /// removed. Invalidates the whole cache.
    pub fn remove_modifiers_from_source(&mut self, source: &SourceId) -> usize {
        let before = self.modifiers.len();
        self.modifiers.retain(|m| &m.source != source);
        let removed = before - self.modifiers.len();
        self.invalidate_all();
        removed
    }

    /// Count down timed modifiers by one turn and drop the ones that expire.
    pub fn tick_durations(&mut self) -> Vec<StatModifier> {
        let mut expired = Vec::new();
        let mut kept = Vec::with_capacity(self.modifiers.len());
        for mut m in self.modifiers.drain(..) {
            match m.duration {
                Some(turns) if turns <= 1 => expired.push(m),
                Some(turns) => {
                    m.duration = Some(turns - 1);
                    kept.push(m);
                }
                None => kept.push(m),
            }
        }
        self.modifiers = kept;
        if !expired.is_empty() {
            self.invalidate_all();
        }
        expired
    }

    pub fn modifiers(&self) -> &[StatModifier] {
        &self.modifiers
    }

    /// Clamped total for a channel.
    pub fn get_total(&self, stat: StatType) -> f32 {
        if let Some(&cached) = self.cache.borrow().get(&stat) {
            return cached;
        }
        let total = self.compute(stat).total;
        self.cache.borrow_mut().insert(stat, total);
        total
    }

    /// Total before the channel's clamp. Not cached.
    pub fn get_unclamped(&self, stat: StatType) -> f32 {
        self.compute(stat).unclamped
    }

    /// Get the breakdown for a channel. Always recomputed.
    pub fn breakdown(&self, stat: StatType) -> StatBreakdown {
        self.compute(stat)
    }

    /// Drop every cached total.
    pub fn invalidate_all(&mut self) {
        self.cache.get_mut().clear();
    }

    /// Number of cached totals; exposed for cache tests.
    pub fn cached_len(&self) -> usize {
        self.cache.borrow().len()
    }

    fn compute(&self, stat: StatType) -> StatBreakdown {
        let base = self.base(stat);
        let mut flat = 0.0;
        let mut percent = 0.0;
        let mut contributions = Vec::new();

        for m in self.modifiers.iter().filter(|m| m.stat == stat) {
            if m.is_percent {
                percent += m.value;
            } else {
                flat += m.value;
            }
            contributions.push((m.source_name.clone(), m.value, m.is_percent));
        }

        let unclamped = (base + flat) * (1.0 + percent / 100.0);
        StatBreakdown {
            stat,
            base,
            flat,
            percent,
            unclamped,
            total: stat.bounds().apply(unclamped),
            contributions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ModuleInstanceId;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_flat_then_percent() {
        let mut p = StatProfile::with_base([(StatType::HpMax, 100.0)]);
        p.add_modifier(StatModifier::flat(StatType::HpMax, 20.0));
        p.add_modifier(StatModifier::percent(StatType::HpMax, 10.0));
        assert!(approx(p.get_total(StatType::HpMax), 132.0));
    }

    #[test]
    fn test_percents_sum_before_multiplying() {
        let mut p = StatProfile::with_base([(StatType::MeleeAttack, 50.0)]);
        p.add_modifier(StatModifier::percent(StatType::MeleeAttack, 20.0));
        p.add_modifier(StatModifier::percent(StatType::MeleeAttack, 30.0));
        // 50 × 1.5, not 50 × 1.2 × 1.3
        assert!(approx(p.get_total(StatType::MeleeAttack), 75.0));
    }

    #[test]
    fn test_clamped_total() {
        let mut p = StatProfile::new();
        p.add_modifier(StatModifier::flat(StatType::Evasion, 200.0));
        assert_eq!(p.get_total(StatType::Evasion), 95.0);
        assert_eq!(p.get_total(StatType::Speed), 10.0);
        assert_eq!(p.get_total(StatType::HpMax), 1.0);
    }

    #[test]
    fn test_add_remove_restores_total() {
        let mut p = StatProfile::with_base([(StatType::Defense, 12.0)]);
        let before = p.get_total(StatType::Defense);
        let id = p.add_modifier(StatModifier::percent(StatType::Defense, 35.0));
        assert!(p.get_total(StatType::Defense) > before);
        assert!(p.remove_modifier(id).is_some());
        assert_eq!(p.get_total(StatType::Defense), before);
    }

    #[test]
    fn test_remove_unknown_modifier() {
        let mut p = StatProfile::new();
        assert!(p.remove_modifier(ModifierId(42)).is_none());
    }

    #[test]
    fn test_cache_cleared_wholesale() {
        let mut p = StatProfile::with_base([(StatType::HpMax, 80.0), (StatType::Speed, 40.0)]);
        p.get_total(StatType::HpMax);
        p.get_total(StatType::Speed);
        assert_eq!(p.cached_len(), 2);

        // Touching one channel drops every cached total.
        p.add_modifier(StatModifier::flat(StatType::Luck, 1.0));
        assert_eq!(p.cached_len(), 0);
        assert_eq!(p.get_total(StatType::Speed), 40.0);
    }

    #[test]
    fn test_remove_by_source() {
        let module = SourceId::Module(ModuleInstanceId(9));
        let mut p = StatProfile::with_base([(StatType::HpMax, 50.0)]);
        p.add_modifier(StatModifier::flat(StatType::HpMax, 10.0).with_source(module.clone(), "Core"));
        p.add_modifier(StatModifier::flat(StatType::Speed, 5.0).with_source(module.clone(), "Core"));
        p.add_modifier(StatModifier::flat(StatType::HpMax, 3.0));

        assert_eq!(p.remove_modifiers_from_source(&module), 2);
        assert_eq!(p.get_total(StatType::HpMax), 53.0);
        assert_eq!(p.modifiers().len(), 1);
    }

    #[test]
    fn test_tick_durations_expires() {
        let mut p = StatProfile::with_base([(StatType::Speed, 30.0)]);
        p.add_modifier(StatModifier::flat(StatType::Speed, 10.0).lasting(2));
        p.add_modifier(StatModifier::flat(StatType::Speed, 5.0));

        assert!(p.tick_durations().is_empty());
        assert_eq!(p.get_total(StatType::Speed), 45.0);

        let expired = p.tick_durations();
        assert_eq!(expired.len(), 1);
        assert_eq!(p.get_total(StatType::Speed), 35.0);
    }

    #[test]
    fn test_breakdown() {
        let mut p = StatProfile::with_base([(StatType::CritChance, 90.0)]);
        p.add_modifier(StatModifier::flat(StatType::CritChance, 20.0).with_source(SourceId::Innate, "Keen"));
        let b = p.breakdown(StatType::CritChance);
        assert_eq!(b.base, 90.0);
        assert_eq!(b.flat, 20.0);
        assert_eq!(b.unclamped, 110.0);
        assert_eq!(b.total, 100.0);
        assert_eq!(b.contributions, vec![("Keen".to_string(), 20.0, false)]);
    }

    #[test]
    fn test_default_base_values() {
        let p = StatProfile::new();
        assert_eq!(p.get_total(StatType::HeatGeneration), 1.0);
        assert_eq!(p.get_total(StatType::CritSeverity), 150.0);
        assert_eq!(p.get_total(StatType::MeleeAccuracy), 95.0);
    }
}
