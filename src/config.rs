//! Tunable combat parameters.

use serde::{Deserialize, Serialize};

/// Combat tunables shared by every combatant in a battle.
///
/// # Examples
///
/// ```rust
/// use zzcombat::CombatConfig;
///
/// let config = CombatConfig::default();
/// assert_eq!(config.atb_base_rate, 20.0);
/// assert_eq!(config.heat_interval, 0.5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// ATB fill per second at speed 0.
    pub atb_base_rate: f32,
    /// Speed that doubles the base fill rate.
    pub speed_divisor: f32,
    /// Seconds between energy regeneration steps.
    pub energy_interval: f32,
    /// Seconds between heat dissipation steps.
    pub heat_interval: f32,
    /// Shape of the cooling curve (α).
    pub heat_curve_alpha: f32,
    /// Fraction of threat removed at every turn end.
    pub threat_decay: f32,
    /// Threat gained per point of healing.
    pub healing_threat_factor: f32,
    /// Flee chance before luck.
    pub flee_base_chance: f32,
}

impl CombatConfig {
    pub const DEFAULT_ATB_BASE_RATE: f32 = 20.0;
    pub const DEFAULT_SPEED_DIVISOR: f32 = 50.0;
    pub const DEFAULT_ENERGY_INTERVAL: f32 = 1.0;
    pub const DEFAULT_HEAT_INTERVAL: f32 = 0.5;
    pub const DEFAULT_HEAT_CURVE_ALPHA: f32 = 3.0;
    pub const DEFAULT_THREAT_DECAY: f32 = 0.1;
    pub const DEFAULT_HEALING_THREAT_FACTOR: f32 = 0.5;
    pub const DEFAULT_FLEE_BASE_CHANCE: f32 = 0.5;

    pub fn new() -> Self {
        Self {
            atb_base_rate: Self::DEFAULT_ATB_BASE_RATE,
            speed_divisor: Self::DEFAULT_SPEED_DIVISOR,
            energy_interval: Self::DEFAULT_ENERGY_INTERVAL,
            heat_interval: Self::DEFAULT_HEAT_INTERVAL,
            heat_curve_alpha: Self::DEFAULT_HEAT_CURVE_ALPHA,
            threat_decay: Self::DEFAULT_THREAT_DECAY,
            healing_threat_factor: Self::DEFAULT_HEALING_THREAT_FACTOR,
            flee_base_chance: Self::DEFAULT_FLEE_BASE_CHANCE,
        }
    }

    /// ATB fill per second for a given speed: `base × (1 + speed / divisor)`.
    pub fn atb_fill_rate(&self, speed: f32) -> f32 {
        self.atb_base_rate * (1.0 + speed.max(0.0) / self.speed_divisor)
    }
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self::new()
    }
}
