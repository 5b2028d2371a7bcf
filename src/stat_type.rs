//! Stat channel module.
//!
//! `StatType` is the closed set of channels a [`StatProfile`](crate::StatProfile)
//! tracks. Each channel carries its own clamp bounds and default base value.

use serde::{Deserialize, Serialize};

/// Elements with their own attack/penetration/mitigation triad.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Element {
    Fire,
    Ice,
    Shock,
    Acid,
    Void,
    Radiant,
}

/// How a hit is delivered; selects the attack/penetration/mitigation triad.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageKind {
    Melee,
    Ranged,
    Elemental(Element),
}

impl DamageKind {
    pub fn attack_stat(self) -> StatType {
        use StatType::*;
        match self {
            DamageKind::Melee => MeleeAttack,
            DamageKind::Ranged => RangedAttack,
            DamageKind::Elemental(e) => match e {
                Element::Fire => FireAttack,
                Element::Ice => IceAttack,
                Element::Shock => ShockAttack,
                Element::Acid => AcidAttack,
                Element::Void => VoidAttack,
                Element::Radiant => RadiantAttack,
            },
        }
    }

    pub fn penetration_stat(self) -> StatType {
        use StatType::*;
        match self {
            DamageKind::Melee => MeleePenetration,
            DamageKind::Ranged => RangedPenetration,
            DamageKind::Elemental(e) => match e {
                Element::Fire => FirePenetration,
                Element::Ice => IcePenetration,
                Element::Shock => ShockPenetration,
                Element::Acid => AcidPenetration,
                Element::Void => VoidPenetration,
                Element::Radiant => RadiantPenetration,
            },
        }
    }

    pub fn mitigation_stat(self) -> StatType {
        use StatType::*;
        match self {
            DamageKind::Melee => MeleeMitigation,
            DamageKind::Ranged => RangedMitigation,
            DamageKind::Elemental(e) => match e {
                Element::Fire => FireMitigation,
                Element::Ice => IceMitigation,
                Element::Shock => ShockMitigation,
                Element::Acid => AcidMitigation,
                Element::Void => VoidMitigation,
                Element::Radiant => RadiantMitigation,
            },
        }
    }

    /// Accuracy channel used for the hit roll. Elemental hits use ranged
    /// accuracy.
    pub fn accuracy_stat(self) -> StatType {
        match self {
            DamageKind::Melee => StatType::MeleeAccuracy,
            _ => StatType::RangedAccuracy,
        }
    }
}

/// A single stat channel.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatType {
    // Tempo
    Speed,
    AtbStartPercent,
    AtbDelayResist,
    CooldownReduction,
    ActionCostReduction,

    // Survival
    HpMax,
    HpRegen,
    Defense,
    DamageReduction,
    HealingReceived,

    // Energy
    EnMax,
    EnRegen,
    EnCostReduction,

    // Heat
    HeatMax,
    HeatGeneration,
    HeatDissipation,
    OverheatRecovery,

    // Precision
    MeleeAccuracy,
    RangedAccuracy,
    Evasion,
    CritChance,
    CritSeverity,
    Luck,
    Threat,

    // Physical triads
    MeleeAttack,
    MeleePenetration,
    MeleeMitigation,
    RangedAttack,
    RangedPenetration,
    RangedMitigation,

    // Elemental triads
    FireAttack,
    FirePenetration,
    FireMitigation,
    IceAttack,
    IcePenetration,
    IceMitigation,
    ShockAttack,
    ShockPenetration,
    ShockMitigation,
    AcidAttack,
    AcidPenetration,
    AcidMitigation,
    VoidAttack,
    VoidPenetration,
    VoidMitigation,
    RadiantAttack,
    RadiantPenetration,
    RadiantMitigation,

    // Status application / resistance pairs
    PoisonApplication,
    PoisonResistance,
    BurnApplication,
    BurnResistance,
    StunApplication,
    StunResistance,
    SlowApplication,
    SlowResistance,
    BlindApplication,
    BlindResistance,
    SilenceApplication,
    SilenceResistance,
    FreezeApplication,
    FreezeResistance,
}

/// Inclusive clamp bounds for a stat channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatBounds {
    pub min: Option<f32>,
    pub max: Option<f32>,
}

impl StatBounds {
    pub const UNBOUNDED: StatBounds = StatBounds {
        min: None,
        max: None,
    };

    const fn at_least(min: f32) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    const fn between(min: f32, max: f32) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Apply the bounds to a value.
    pub fn apply(self, value: f32) -> f32 {
        let mut v = value;
        if let Some(min) = self.min {
            v = v.max(min);
        }
        if let Some(max) = self.max {
            v = v.min(max);
        }
        v
    }
}

impl StatType {
    /// Every channel, in declaration order.
    pub const ALL: [StatType; 62] = {
        use StatType::*;
        [
            Speed,
            AtbStartPercent,
            AtbDelayResist,
            CooldownReduction,
            ActionCostReduction,
            HpMax,
            HpRegen,
            Defense,
            DamageReduction,
            HealingReceived,
            EnMax,
            EnRegen,
            EnCostReduction,
            HeatMax,
            HeatGeneration,
            HeatDissipation,
            OverheatRecovery,
            MeleeAccuracy,
            RangedAccuracy,
            Evasion,
            CritChance,
            CritSeverity,
            Luck,
            Threat,
            MeleeAttack,
            MeleePenetration,
            MeleeMitigation,
            RangedAttack,
            RangedPenetration,
            RangedMitigation,
            FireAttack,
            FirePenetration,
            FireMitigation,
            IceAttack,
            IcePenetration,
            IceMitigation,
            ShockAttack,
            ShockPenetration,
            ShockMitigation,
            AcidAttack,
            AcidPenetration,
            AcidMitigation,
            VoidAttack,
            VoidPenetration,
            VoidMitigation,
            RadiantAttack,
            RadiantPenetration,
            RadiantMitigation,
            PoisonApplication,
            PoisonResistance,
            BurnApplication,
            BurnResistance,
            StunApplication,
            StunResistance,
            SlowApplication,
            SlowResistance,
            BlindApplication,
            BlindResistance,
            SilenceApplication,
            SilenceResistance,
            FreezeApplication,
            FreezeResistance,
        ]
    };

    /// Clamp bounds applied to this channel's total.
    pub fn bounds(self) -> StatBounds {
        use StatType::*;
        match self {
            HpMax | EnMax => StatBounds::at_least(1.0),
            MeleeAccuracy | RangedAccuracy => StatBounds::between(5.0, 100.0),
            Evasion => StatBounds::between(0.0, 95.0),
            CritChance => StatBounds::between(0.0, 100.0),
            CritSeverity => StatBounds::at_least(100.0),
            HeatGeneration | HeatDissipation => StatBounds::at_least(0.1),
            Speed => StatBounds::at_least(10.0),
            AtbStartPercent => StatBounds::between(0.0, 100.0),
            AtbDelayResist => StatBounds::between(0.0, 90.0),
            s if s.is_status_resistance() => StatBounds::between(0.0, 90.0),
            _ => StatBounds::UNBOUNDED,
        }
    }

    /// Base value used when a profile has no explicit entry for the channel.
    pub fn default_base(self) -> f32 {
        use StatType::*;
        match self {
            HeatGeneration | HeatDissipation => 1.0,
            CritSeverity => 150.0,
            MeleeAccuracy | RangedAccuracy => 95.0,
            _ => 0.0,
        }
    }

    pub fn is_status_resistance(self) -> bool {
        use StatType::*;
        matches!(
            self,
            PoisonResistance
                | BurnResistance
                | StunResistance
                | SlowResistance
                | BlindResistance
                | SilenceResistance
                | FreezeResistance
        )
    }
}

impl std::fmt::Display for StatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
