// Quality/power policy
//
// Turns battery, memory and network readings into a quality tier that
// controls background concurrency, skipped resource kinds and retry backoff.

mod monitor;
mod rules;
mod signals;
mod system;
mod throughput;
mod tier;

pub use monitor::{PolicyMonitor, SignalProviders};
pub use rules::{DefaultPolicy, PolicyThresholds, QualityPolicy};
pub use signals::{
    BatteryProvider, BatteryStatus, MemoryPressureProvider, NetworkClass, NetworkClassProvider,
    Signal, SignalSnapshot,
};
pub use system::SystemMemoryProvider;
pub use throughput::{ThroughputEstimator, ThroughputThresholds};
pub use tier::{QualityTier, TierProfile, TierTable};
