// Events published by a loader session

use crate::loader::FetchError;
use crate::policy::QualityTier;
use std::time::Duration;

/// Overall loading progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    /// Fraction in `[0, 1]`, never decreasing within a session
    pub fraction: f64,
    /// `true` when derived from byte counts, `false` when from task counts
    pub determinate: bool,
}

/// Everything a subscriber can observe
#[derive(Debug, Clone, PartialEq)]
pub enum LoaderEvent {
    Progress(ProgressUpdate),
    /// The critical resource loaded, or there was none
    CriticalReady,
    /// The critical resource exhausted its retry budget
    CriticalFailed(FetchError),
    /// Every task reached a terminal state
    AllComplete,
    TierChanged(QualityTier),
    /// A task failed permanently
    TaskFailed { id: String, error: FetchError },
    /// A failed attempt will be retried after `delay`
    TaskRetrying {
        id: String,
        attempt: u32,
        delay: Duration,
        error: FetchError,
    },
    TaskSucceeded { id: String, bytes: u64 },
    TaskSkipped { id: String },
    Disposed,
}

impl LoaderEvent {
    /// Check if this event is replayed to late subscribers
    pub fn is_milestone(&self) -> bool {
        matches!(
            self,
            LoaderEvent::CriticalReady
                | LoaderEvent::CriticalFailed(_)
                | LoaderEvent::AllComplete
                | LoaderEvent::TierChanged(_)
                | LoaderEvent::Disposed
        )
    }

    /// Short name, for logging
    pub fn name(&self) -> &'static str {
        match self {
            LoaderEvent::Progress(_) => "progress",
            LoaderEvent::CriticalReady => "critical-ready",
            LoaderEvent::CriticalFailed(_) => "critical-failed",
            LoaderEvent::AllComplete => "all-complete",
            LoaderEvent::TierChanged(_) => "tier-changed",
            LoaderEvent::TaskFailed { .. } => "task-failed",
            LoaderEvent::TaskRetrying { .. } => "task-retrying",
            LoaderEvent::TaskSucceeded { .. } => "task-succeeded",
            LoaderEvent::TaskSkipped { .. } => "task-skipped",
            LoaderEvent::Disposed => "disposed",
        }
    }
}
