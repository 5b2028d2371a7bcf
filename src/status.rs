//! Status effects.
//!
//! Effects tick once per owner turn-end, never per ATB tick. Damage and
//! healing amounts use integer floor division of max HP.

use crate::stat_type::StatType;
use serde::{Deserialize, Serialize};

/// Status effects a combatant can carry.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatusEffect {
    /// Loses `max_hp / 16` per turn.
    Poison,
    /// Loses `max_hp / 12` per turn.
    Burn,
    /// Restores `max_hp / 10` per turn.
    Regen,
    /// Loses its next turn.
    Stun,
    /// Loses its next turn.
    Freeze,
    /// ATB fills at half rate.
    Slow,
    /// Accuracy penalty on attacks.
    Blind,
    /// Cannot use abilities.
    Silence,
}

/// HP change produced by one status tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTick {
    Damage(i32),
    Heal(i32),
}

impl StatusEffect {
    /// Accuracy lost while blinded.
    pub const BLIND_ACCURACY_PENALTY: f32 = 30.0;

    /// HP change this effect causes at turn end, if any.
    pub fn tick(self, max_hp: i32) -> Option<StatusTick> {
        match self {
            StatusEffect::Poison => Some(StatusTick::Damage(max_hp / 16)),
            StatusEffect::Burn => Some(StatusTick::Damage(max_hp / 12)),
            StatusEffect::Regen => Some(StatusTick::Heal(max_hp / 10)),
            _ => None,
        }
    }

    pub fn prevents_action(self) -> bool {
        matches!(self, StatusEffect::Stun | StatusEffect::Freeze)
    }

    pub fn is_debuff(self) -> bool {
        self != StatusEffect::Regen
    }

    /// Stat pair governing infliction, if the effect is resistible.
    pub fn application_pair(self) -> Option<(StatType, StatType)> {
        use StatType::*;
        match self {
            StatusEffect::Poison => Some((PoisonApplication, PoisonResistance)),
            StatusEffect::Burn => Some((BurnApplication, BurnResistance)),
            StatusEffect::Stun => Some((StunApplication, StunResistance)),
            StatusEffect::Slow => Some((SlowApplication, SlowResistance)),
            StatusEffect::Blind => Some((BlindApplication, BlindResistance)),
            StatusEffect::Silence => Some((SilenceApplication, SilenceResistance)),
            StatusEffect::Freeze => Some((FreezeApplication, FreezeResistance)),
            StatusEffect::Regen => None,
        }
    }
}

impl std::fmt::Display for StatusEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StatusEffect::Poison => "poisoned",
            StatusEffect::Burn => "burning",
            StatusEffect::Regen => "regenerating",
            StatusEffect::Stun => "stunned",
            StatusEffect::Freeze => "frozen",
            StatusEffect::Slow => "slowed",
            StatusEffect::Blind => "blinded",
            StatusEffect::Silence => "silenced",
        };
        write!(f, "{}", s)
    }
}
