// Critical-path gate: readiness bound to the critical resource

use super::{FailureAction, FetchError, LoadTask, RetryPolicy, TaskId};

/// Outcome of waiting for readiness
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadyResult {
    /// The critical resource loaded, or the session had none
    Ready,
    /// The critical resource could not be loaded
    CriticalLoadFailed(FetchError),
}

impl ReadyResult {
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadyResult::Ready)
    }
}

/// Owns the critical task and decides readiness
///
/// Readiness is decided exactly once: `Ready` when the critical task succeeds
/// (or immediately when there is none), `CriticalLoadFailed` when it exhausts
/// its retry budget or the session is disposed first.
#[derive(Debug)]
pub struct CriticalPathGate {
    task: Option<LoadTask>,
    retry: RetryPolicy,
    outcome: Option<ReadyResult>,
}

impl CriticalPathGate {
    pub fn new(task: Option<LoadTask>, retry: RetryPolicy) -> Self {
        let outcome = match task {
            Some(_) => None,
            None => Some(ReadyResult::Ready),
        };
        Self {
            task,
            retry,
            outcome,
        }
    }

    pub fn task(&self) -> Option<&LoadTask> {
        self.task.as_ref()
    }

    pub fn task_id(&self) -> Option<TaskId> {
        self.task.as_ref().map(LoadTask::id)
    }

    /// Check if a task id belongs to the gate
    pub fn owns(&self, id: TaskId) -> bool {
        self.task_id() == Some(id)
    }

    pub fn outcome(&self) -> Option<&ReadyResult> {
        self.outcome.as_ref()
    }

    /// Check if readiness has been decided
    pub fn is_decided(&self) -> bool {
        self.outcome.is_some()
    }

    /// Start the first attempt; returns its number
    pub fn start(&mut self) -> Option<u32> {
        let task = self.task.as_mut()?;
        if task.state() != super::TaskState::Pending {
            return None;
        }
        Some(task.begin_attempt())
    }

    /// Start the retry that follows `attempt`; returns the new attempt number
    pub fn begin_retry(&mut self, attempt: u32) -> Option<u32> {
        let task = self.task.as_mut()?;
        if !task.is_retry_pending() || task.attempt() != attempt {
            return None;
        }
        Some(task.begin_attempt())
    }

    /// Record byte progress; ignored for stale attempts
    pub fn record_progress(&mut self, attempt: u32, loaded: u64, total: Option<u64>) -> bool {
        match self.current(attempt) {
            Some(task) => {
                task.record_progress(loaded, total);
                true
            }
            None => false,
        }
    }

    /// Record a successful attempt; returns `false` for stale attempts
    pub fn on_success(&mut self, attempt: u32, bytes: u64) -> bool {
        let Some(task) = self.current(attempt) else {
            return false;
        };
        task.succeed(bytes);
        self.outcome = Some(ReadyResult::Ready);
        true
    }

    /// Record a failed attempt and decide whether to retry
    ///
    /// Returns `None` for stale attempts. A `GiveUp` decides readiness as
    /// failed.
    pub fn on_failure(
        &mut self,
        attempt: u32,
        error: FetchError,
        backoff_scale: f64,
    ) -> Option<FailureAction> {
        let action = self
            .retry
            .on_failure(attempt, error.is_retryable(), backoff_scale);
        let task = self.current(attempt)?;
        task.fail(error.clone(), matches!(action, FailureAction::Retry(_)));
        if action == FailureAction::GiveUp {
            self.outcome = Some(ReadyResult::CriticalLoadFailed(error));
        }
        Some(action)
    }

    /// Cancel the critical task if it is still unsettled
    ///
    /// An undecided gate resolves as `CriticalLoadFailed(Cancelled)`.
    pub fn cancel(&mut self) -> bool {
        let cancelled = self.task.as_mut().map(LoadTask::cancel).unwrap_or(false);
        if self.outcome.is_none() {
            self.outcome = Some(ReadyResult::CriticalLoadFailed(FetchError::Cancelled));
        }
        cancelled
    }

    fn current(&mut self, attempt: u32) -> Option<&mut LoadTask> {
        self.task.as_mut().filter(|task| {
            task.state() == super::TaskState::InFlight && task.attempt() == attempt
        })
    }
}
