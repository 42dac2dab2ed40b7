// Host memory pressure from the operating system

use super::MemoryPressureProvider;
use std::sync::{Mutex, PoisonError};
use sysinfo::System;

/// Reports used / total physical memory as memory pressure
pub struct SystemMemoryProvider {
    system: Mutex<System>,
}

impl SystemMemoryProvider {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPressureProvider for SystemMemoryProvider {
    fn memory_pressure(&self) -> Option<f32> {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_memory();

        let total = system.total_memory();
        if total == 0 {
            return None;
        }
        let pressure = system.used_memory() as f64 / total as f64;
        Some(pressure.clamp(0.0, 1.0) as f32)
    }
}

impl std::fmt::Debug for SystemMemoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SystemMemoryProvider")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pressure_in_unit_range() {
        let provider = SystemMemoryProvider::new();
        if let Some(pressure) = provider.memory_pressure() {
            assert!((0.0..=1.0).contains(&pressure));
        }
    }
}
