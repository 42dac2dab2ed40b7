// External device signals consumed by the quality policy

use serde::{Deserialize, Serialize};

/// Coarse network speed class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NetworkClass {
    Slow,
    Medium,
    Fast,
    #[default]
    Unknown,
}

/// Battery reading
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryStatus {
    /// Charge level in `[0, 1]`, if the platform reports it
    pub level: Option<f32>,
    /// Whether the device is plugged in, if known
    pub charging: Option<bool>,
}

impl BatteryStatus {
    pub fn new(level: f32, charging: bool) -> Self {
        Self {
            level: Some(level),
            charging: Some(charging),
        }
    }
}

/// Everything the policy knows at one point in time
///
/// Missing inputs stay `None` (or `Unknown`); they never block evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalSnapshot {
    pub battery_level: Option<f32>,
    pub is_charging: Option<bool>,
    pub memory_pressure: Option<f32>,
    pub network_class: NetworkClass,
}

impl SignalSnapshot {
    /// Merge one reading into the snapshot
    pub fn apply(&mut self, signal: Signal) {
        match signal {
            Signal::Battery(status) => {
                self.battery_level = status.level.map(unit);
                self.is_charging = status.charging;
            }
            Signal::MemoryPressure(pressure) => self.memory_pressure = pressure.map(unit),
            Signal::Network(class) => self.network_class = class,
        }
    }
}

/// A single pushed or polled reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum Signal {
    Battery(BatteryStatus),
    MemoryPressure(Option<f32>),
    Network(NetworkClass),
}

/// Battery level and charging state source
pub trait BatteryProvider: Send + Sync {
    /// Current reading, or `None` when unavailable
    fn battery(&self) -> Option<BatteryStatus>;
}

/// Memory pressure source, reporting a fraction in `[0, 1]`
pub trait MemoryPressureProvider: Send + Sync {
    fn memory_pressure(&self) -> Option<f32>;
}

/// Network class source
pub trait NetworkClassProvider: Send + Sync {
    fn network_class(&self) -> NetworkClass;
}

fn unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
