// Signal-to-tier rules

use super::{NetworkClass, QualityTier, SignalSnapshot};
use serde::{Deserialize, Serialize};

/// Maps a signal snapshot to a quality tier
///
/// Implementations must be pure: the same snapshot always yields the same tier.
pub trait QualityPolicy: Send + Sync {
    fn evaluate(&self, signals: &SignalSnapshot) -> QualityTier;
}

/// Thresholds used by [`DefaultPolicy`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyThresholds {
    /// Battery level below which (while discharging) the tier drops to Minimal
    pub minimal_battery: f32,
    /// Memory pressure at or above which the tier drops to Minimal
    pub minimal_memory_pressure: f32,
    /// Battery level below which (while discharging) the tier drops to Reduced
    pub reduced_battery: f32,
    /// Whether a slow network alone forces Reduced
    pub reduce_on_slow_network: bool,
}

impl Default for PolicyThresholds {
    fn default() -> Self {
        Self {
            minimal_battery: 0.20,
            minimal_memory_pressure: 0.90,
            reduced_battery: 0.40,
            reduce_on_slow_network: true,
        }
    }
}

/// Battery, memory and network driven policy
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultPolicy {
    thresholds: PolicyThresholds,
}

impl DefaultPolicy {
    pub fn new(thresholds: PolicyThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &PolicyThresholds {
        &self.thresholds
    }

    fn battery_below(signals: &SignalSnapshot, threshold: f32) -> bool {
        // unknown charging state counts as discharging
        let discharging = !signals.is_charging.unwrap_or(false);
        matches!(signals.battery_level, Some(level) if level < threshold) && discharging
    }
}

impl QualityPolicy for DefaultPolicy {
    fn evaluate(&self, signals: &SignalSnapshot) -> QualityTier {
        let t = &self.thresholds;

        let memory_critical =
            matches!(signals.memory_pressure, Some(p) if p >= t.minimal_memory_pressure);
        if Self::battery_below(signals, t.minimal_battery) || memory_critical {
            return QualityTier::Minimal;
        }

        let slow_network =
            t.reduce_on_slow_network && signals.network_class == NetworkClass::Slow;
        if Self::battery_below(signals, t.reduced_battery) || slow_network {
            return QualityTier::Reduced;
        }

        QualityTier::Full
    }
}

impl<F> QualityPolicy for F
where
    F: Fn(&SignalSnapshot) -> QualityTier + Send + Sync,
{
    fn evaluate(&self, signals: &SignalSnapshot) -> QualityTier {
        self(signals)
    }
}
