// Loader configuration
//
// Everything here is plain data so a viewer can ship its loader settings next
// to its resource manifest. Durations are expressed in milliseconds on the wire.

use crate::loader::RetryPolicy;
use crate::policy::{PolicyThresholds, TierTable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-fetch timeout
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default minimum spacing between progress events
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(50);

/// Default polling period for external signal providers
pub const DEFAULT_SIGNAL_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Options for a single loader session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoaderOptions {
    /// Timeout applied to every fetch attempt (`None` = unbounded)
    #[serde(rename = "fetchTimeoutMs", with = "option_millis")]
    pub fetch_timeout: Option<Duration>,

    /// Retry budget for the critical resource
    pub critical_retry: RetryPolicy,

    /// Retry budget for background resources
    pub background_retry: RetryPolicy,

    /// Per-tier concurrency, skip sets and backoff scaling
    pub tiers: TierTable,

    /// Thresholds of the default quality policy
    pub thresholds: PolicyThresholds,

    /// Minimum spacing between byte-level progress events
    #[serde(rename = "progressIntervalMs", with = "millis")]
    pub progress_interval: Duration,

    /// Polling period for signal providers (`None` = push only)
    #[serde(rename = "signalPollIntervalMs", with = "option_millis")]
    pub signal_poll_interval: Option<Duration>,

    /// Keep admitting background work after the critical resource failed
    pub continue_after_critical_failure: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Some(DEFAULT_FETCH_TIMEOUT),
            critical_retry: RetryPolicy::critical(),
            background_retry: RetryPolicy::background(),
            tiers: TierTable::default(),
            thresholds: PolicyThresholds::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            signal_poll_interval: Some(DEFAULT_SIGNAL_POLL_INTERVAL),
            continue_after_critical_failure: false,
        }
    }
}

impl LoaderOptions {
    /// Parse options from a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Set the per-fetch timeout
    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set the signal polling period
    pub fn with_signal_poll_interval(mut self, interval: Option<Duration>) -> Self {
        self.signal_poll_interval = interval;
        self
    }

    /// Set the progress coalescing interval
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }
}

/// Serde adapter for `Duration` as integer milliseconds
pub(crate) mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// Serde adapter for `Option<Duration>` as nullable integer milliseconds
pub(crate) mod option_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
