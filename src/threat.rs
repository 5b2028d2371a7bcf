//! Threat tracking module.
//!
//! `ThreatTable` accumulates aggro per combatant for one battle. It is created
//! at battle start, decayed once per turn end and cleared when the battle
//! ends.

use crate::combatant::CombatantState;
use crate::ids::CombatantId;
use std::collections::HashMap;

/// Per-battle aggro table.
///
/// Values are stored as `f32` and only truncated on read-out, so repeated
/// decay approaches zero without reaching it.
///
/// # Examples
///
/// ```rust
/// use zzcombat::ThreatTable;
/// use zzcombat::ids::CombatantId;
///
/// let (a, b) = (CombatantId(1), CombatantId(2));
/// let mut table = ThreatTable::new();
/// table.add_threat(a, 50.0);
/// table.add_threat(b, 80.0);
/// table.decay(0.1);
///
/// assert_eq!(table.threat_display(a), 45);
/// assert_eq!(table.threat_display(b), 72);
/// assert_eq!(table.highest_among([a, b]), Some(b));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ThreatTable {
    values: HashMap<CombatantId, f32>,
}

impl ThreatTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate threat. Zero, negative and non-finite amounts are dropped.
    pub fn add_threat(&mut self, source: CombatantId, amount: f32) {
        if amount <= 0.0 || !amount.is_finite() {
            tracing::debug!("dropping threat {} for {}", amount, source);
            return;
        }
        *self.values.entry(source).or_insert(0.0) += amount;
    }

    /// Raw threat for a combatant; 0 when it has none.
    pub fn threat(&self, id: CombatantId) -> f32 {
        self.values.get(&id).copied().unwrap_or(0.0)
    }

    /// Threat as shown to the player, truncated toward zero.
    pub fn threat_display(&self, id: CombatantId) -> u32 {
        self.threat(id).floor() as u32
    }

    /// Strict maximum over `candidates` in the order given.
    ///
    /// Ties keep the earlier candidate; candidates without an entry count as
    /// zero, so the first candidate wins an all-zero table.
    pub fn highest_among(&self, candidates: impl IntoIterator<Item = CombatantId>) -> Option<CombatantId> {
        let mut best: Option<(CombatantId, f32)> = None;
        for id in candidates {
            let value = self.threat(id);
            match best {
                Some((_, top)) if value <= top => {}
                _ => best = Some((id, value)),
            }
        }
        best.map(|(id, _)| id)
    }

    /// Highest-threat live combatant among `candidates`.
    pub fn get_highest<'a>(&self, candidates: &[&'a CombatantState]) -> Option<&'a CombatantState> {
        let id = self.highest_among(candidates.iter().filter(|c| c.is_alive()).map(|c| c.id()))?;
        candidates.iter().copied().find(|c| c.id() == id)
    }

    /// Scale every entry by `1 − pct`.
    pub fn decay(&mut self, pct: f32) {
        let keep = (1.0 - pct).clamp(0.0, 1.0);
        for value in self.values.values_mut() {
            *value *= keep;
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}
