// Network classification from observed transfer rates

use super::{NetworkClass, NetworkClassProvider};
use crate::core::math::ewma;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Transfers smaller than this are dominated by latency and are ignored
const MIN_SAMPLE_BYTES: u64 = 16 * 1024;

/// Weight of the newest sample in the moving average
const SAMPLE_WEIGHT: f64 = 0.3;

/// Rate boundaries for classification, in bytes per second
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputThresholds {
    pub slow_below: f64,
    pub fast_above: f64,
    /// Samples needed before any class other than `Unknown` is reported
    pub min_samples: u32,
}

impl Default for ThroughputThresholds {
    fn default() -> Self {
        Self {
            slow_below: 150_000.0,
            fast_above: 1_250_000.0,
            min_samples: 2,
        }
    }
}

#[derive(Debug, Default)]
struct Estimate {
    average: Option<f64>,
    samples: u32,
}

/// Network class provider fed by completed fetches
#[derive(Debug, Default)]
pub struct ThroughputEstimator {
    thresholds: ThroughputThresholds,
    estimate: Mutex<Estimate>,
}

impl ThroughputEstimator {
    pub fn new(thresholds: ThroughputThresholds) -> Self {
        Self {
            thresholds,
            estimate: Mutex::new(Estimate::default()),
        }
    }

    /// Record one completed transfer
    pub fn record(&self, bytes: u64, elapsed: Duration) {
        if bytes < MIN_SAMPLE_BYTES || elapsed.is_zero() {
            return;
        }
        let rate = bytes as f64 / elapsed.as_secs_f64();
        let mut estimate = self.estimate.lock().unwrap_or_else(PoisonError::into_inner);
        estimate.average = Some(ewma(estimate.average, rate, SAMPLE_WEIGHT));
        estimate.samples = estimate.samples.saturating_add(1);
    }

    /// Smoothed transfer rate, once enough samples arrived
    pub fn bytes_per_second(&self) -> Option<f64> {
        let estimate = self.estimate.lock().unwrap_or_else(PoisonError::into_inner);
        if estimate.samples < self.thresholds.min_samples {
            return None;
        }
        estimate.average
    }

    /// Forget every sample
    pub fn reset(&self) {
        *self.estimate.lock().unwrap_or_else(PoisonError::into_inner) = Estimate::default();
    }
}

impl NetworkClassProvider for ThroughputEstimator {
    fn network_class(&self) -> NetworkClass {
        match self.bytes_per_second() {
            None => NetworkClass::Unknown,
            Some(rate) if rate < self.thresholds.slow_below => NetworkClass::Slow,
            Some(rate) if rate >= self.thresholds.fast_above => NetworkClass::Fast,
            Some(_) => NetworkClass::Medium,
        }
    }
}
