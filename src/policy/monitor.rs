// Signal collection and tier tracking

use super::{
    BatteryProvider, MemoryPressureProvider, NetworkClassProvider, QualityPolicy, QualityTier,
    Signal, SignalSnapshot,
};
use std::sync::Arc;

/// Optional signal collaborators; any of them may be absent
#[derive(Clone, Default)]
pub struct SignalProviders {
    pub battery: Option<Arc<dyn BatteryProvider>>,
    pub memory: Option<Arc<dyn MemoryPressureProvider>>,
    pub network: Option<Arc<dyn NetworkClassProvider>>,
}

impl SignalProviders {
    /// Check if no provider is installed
    pub fn is_empty(&self) -> bool {
        self.battery.is_none() && self.memory.is_none() && self.network.is_none()
    }
}

impl std::fmt::Debug for SignalProviders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalProviders")
            .field("battery", &self.battery.is_some())
            .field("memory", &self.memory.is_some())
            .field("network", &self.network.is_some())
            .finish()
    }
}

/// Tracks the latest signals and the tier derived from them
///
/// The session driver is the single writer; everything else reads the tier it
/// publishes.
pub struct PolicyMonitor {
    providers: SignalProviders,
    policy: Arc<dyn QualityPolicy>,
    signals: SignalSnapshot,
    tier: QualityTier,
}

impl PolicyMonitor {
    pub fn new(providers: SignalProviders, policy: Arc<dyn QualityPolicy>) -> Self {
        Self {
            providers,
            policy,
            signals: SignalSnapshot::default(),
            tier: QualityTier::Full,
        }
    }

    /// Current tier
    pub fn tier(&self) -> QualityTier {
        self.tier
    }

    /// Latest merged signals
    pub fn signals(&self) -> &SignalSnapshot {
        &self.signals
    }

    /// Sample every installed provider and re-evaluate
    ///
    /// Returns the new tier if it changed.
    pub fn poll(&mut self) -> Option<QualityTier> {
        if let Some(battery) = &self.providers.battery {
            if let Some(status) = battery.battery() {
                self.signals.apply(Signal::Battery(status));
            }
        }
        if let Some(memory) = &self.providers.memory {
            self.signals
                .apply(Signal::MemoryPressure(memory.memory_pressure()));
        }
        if let Some(network) = &self.providers.network {
            self.signals.apply(Signal::Network(network.network_class()));
        }
        self.evaluate()
    }

    /// Merge a pushed reading and re-evaluate
    ///
    /// Returns the new tier if it changed.
    pub fn push(&mut self, signal: Signal) -> Option<QualityTier> {
        self.signals.apply(signal);
        self.evaluate()
    }

    fn evaluate(&mut self) -> Option<QualityTier> {
        let next = self.policy.evaluate(&self.signals);
        if next == self.tier {
            return None;
        }
        log::info!("Quality tier {} -> {} ({:?})", self.tier, next, self.signals);
        self.tier = next;
        Some(next)
    }
}

impl std::fmt::Debug for PolicyMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyMonitor")
            .field("providers", &self.providers)
            .field("signals", &self.signals)
            .field("tier", &self.tier)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{BatteryStatus, DefaultPolicy, NetworkClass};
    use std::sync::Mutex;

    struct FixedBattery(Mutex<Option<BatteryStatus>>);

    impl BatteryProvider for FixedBattery {
        fn battery(&self) -> Option<BatteryStatus> {
            *self.0.lock().unwrap()
        }
    }

    struct FixedMemory(f32);

    impl MemoryPressureProvider for FixedMemory {
        fn memory_pressure(&self) -> Option<f32> {
            Some(self.0)
        }
    }

    fn monitor(providers: SignalProviders) -> PolicyMonitor {
        PolicyMonitor::new(providers, Arc::new(DefaultPolicy::default()))
    }

    #[test]
    fn test_no_providers_stays_full() {
        let mut monitor = monitor(SignalProviders::default());
        assert_eq!(monitor.poll(), None);
        assert_eq!(monitor.tier(), QualityTier::Full);
    }

    #[test]
    fn test_poll_detects_change_once() {
        let battery = Arc::new(FixedBattery(Mutex::new(Some(BatteryStatus::new(0.5, false)))));
        let mut monitor = monitor(SignalProviders {
            battery: Some(battery.clone()),
            ..SignalProviders::default()
        });

        assert_eq!(monitor.poll(), None);

        *battery.0.lock().unwrap() = Some(BatteryStatus::new(0.15, false));
        assert_eq!(monitor.poll(), Some(QualityTier::Minimal));
        assert_eq!(monitor.poll(), None);
    }

    #[test]
    fn test_unavailable_battery_keeps_last_reading() {
        let battery = Arc::new(FixedBattery(Mutex::new(Some(BatteryStatus::new(0.3, false)))));
        let mut monitor = monitor(SignalProviders {
            battery: Some(battery.clone()),
            ..SignalProviders::default()
        });
        assert_eq!(monitor.poll(), Some(QualityTier::Reduced));

        *battery.0.lock().unwrap() = None;
        assert_eq!(monitor.poll(), None);
        assert_eq!(monitor.signals().battery_level, Some(0.3));
    }

    #[test]
    fn test_memory_provider() {
        let mut monitor = monitor(SignalProviders {
            memory: Some(Arc::new(FixedMemory(0.95))),
            ..SignalProviders::default()
        });
        assert_eq!(monitor.poll(), Some(QualityTier::Minimal));
    }

    #[test]
    fn test_push_signal() {
        let mut monitor = monitor(SignalProviders::default());
        assert_eq!(
            monitor.push(Signal::Network(NetworkClass::Slow)),
            Some(QualityTier::Reduced)
        );
        assert_eq!(
            monitor.push(Signal::Network(NetworkClass::Fast)),
            Some(QualityTier::Full)
        );
    }
}
