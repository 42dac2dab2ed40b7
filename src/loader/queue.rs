// Background loading queue

use super::{FailureAction, FetchError, LoadTask, LoaderError, RetryPolicy, TaskId, TaskState};
use crate::policy::TierProfile;

/// Outcome of one admission pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Admission {
    /// Tasks that began an attempt, with the attempt number
    pub started: Vec<(TaskId, u32)>,
    /// Tasks dropped by the current skip set
    pub skipped: Vec<TaskId>,
}

impl Admission {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.skipped.is_empty()
    }
}

/// Admits non-critical tasks in ascending order under a concurrency cap
///
/// Active tasks are the in-flight ones plus those waiting on a retry timer,
/// so a failing task keeps its slot until it settles.
#[derive(Debug)]
pub struct BackgroundQueue {
    tasks: Vec<LoadTask>,
    retry: RetryPolicy,
    accepting: bool,
}

impl BackgroundQueue {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            tasks: Vec::new(),
            retry,
            accepting: true,
        }
    }

    /// Add tasks, keeping the queue sorted by load order
    pub fn enqueue_all(&mut self, tasks: impl IntoIterator<Item = LoadTask>) {
        self.tasks.extend(tasks);
        self.tasks
            .sort_by_key(|task| (task.descriptor().order(), task.id()));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> &[LoadTask] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&LoadTask> {
        self.tasks.iter().find(|task| task.id() == id)
    }

    /// Check if new fetches are still admitted
    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    /// Number of tasks holding a loading slot
    pub fn active_count(&self) -> usize {
        self.tasks.iter().filter(|task| task.is_active()).count()
    }

    /// Check if every task reached a terminal state
    pub fn is_settled(&self) -> bool {
        self.tasks.iter().all(LoadTask::is_terminal)
    }

    /// Skip pending tasks whose kind the profile drops
    ///
    /// Force-loaded tasks are exempt. Returns the skipped ids in load order.
    pub fn apply_tier(&mut self, profile: &TierProfile) -> Vec<TaskId> {
        let mut skipped = Vec::new();
        for task in &mut self.tasks {
            if task.state() == TaskState::Pending && !task.is_forced() && profile.skips(task.kind())
            {
                task.skip();
                skipped.push(task.id());
            }
        }
        skipped
    }

    /// Start pending tasks until the profile's cap is reached
    ///
    /// Skip sets are applied first. Once admissions have stopped only
    /// force-loaded and preempted tasks are started.
    pub fn admit(&mut self, profile: &TierProfile) -> Admission {
        let mut admission = Admission {
            skipped: self.apply_tier(profile),
            ..Default::default()
        };

        let cap = profile.cap();
        let mut active = self.active_count();
        for task in &mut self.tasks {
            if active >= cap {
                break;
            }
            if task.state() != TaskState::Pending {
                continue;
            }
            if !self.accepting && !task.is_forced() && !task.is_preempted() {
                continue;
            }
            let attempt = task.begin_attempt();
            admission.started.push((task.id(), attempt));
            active += 1;
        }
        admission
    }

    /// Start the retry that follows `attempt`; returns the new attempt number
    pub fn begin_retry(&mut self, id: TaskId, attempt: u32) -> Option<u32> {
        let task = self.task_mut(id)?;
        if !task.is_retry_pending() || task.attempt() != attempt {
            return None;
        }
        Some(task.begin_attempt())
    }

    /// Record byte progress; ignored for stale attempts
    pub fn record_progress(
        &mut self,
        id: TaskId,
        attempt: u32,
        loaded: u64,
        total: Option<u64>,
    ) -> bool {
        match self.current(id, attempt) {
            Some(task) => {
                task.record_progress(loaded, total);
                true
            }
            None => false,
        }
    }

    /// Record a successful attempt; returns `false` for stale attempts
    pub fn on_success(&mut self, id: TaskId, attempt: u32, bytes: u64) -> bool {
        match self.current(id, attempt) {
            Some(task) => {
                task.succeed(bytes);
                true
            }
            None => false,
        }
    }

    /// Record a failed attempt and decide whether to retry
    pub fn on_failure(
        &mut self,
        id: TaskId,
        attempt: u32,
        error: FetchError,
        backoff_scale: f64,
    ) -> Option<FailureAction> {
        let task = self.tasks.iter_mut().find(|task| {
            task.id() == id && task.state() == TaskState::InFlight && task.attempt() == attempt
        })?;
        let action =
            self.retry
                .on_failure(task.budgeted_attempts(), error.is_retryable(), backoff_scale);
        task.fail(error, matches!(action, FailureAction::Retry(_)));
        Some(action)
    }

    /// Send the last-ordered active tasks back to pending until at most `cap`
    /// hold a slot
    ///
    /// Returns the requeued ids; their running fetch or retry timer must be
    /// aborted by the caller.
    pub fn demote_excess(&mut self, cap: usize) -> Vec<TaskId> {
        let mut excess = self.active_count().saturating_sub(cap);
        let mut demoted = Vec::new();
        for task in self.tasks.iter_mut().rev() {
            if excess == 0 {
                break;
            }
            if task.is_active() && task.requeue() {
                demoted.push(task.id());
                excess -= 1;
            }
        }
        demoted
    }

    /// Stop admitting and cancel every pending task
    ///
    /// In-flight and retrying tasks are left to finish.
    pub fn stop_admitting(&mut self) -> Vec<TaskId> {
        self.accepting = false;
        self.tasks
            .iter_mut()
            .filter(|task| task.state() == TaskState::Pending)
            .filter_map(|task| task.cancel().then(|| task.id()))
            .collect()
    }

    /// Cancel every unsettled task, in-flight ones included
    pub fn cancel_all(&mut self) -> Vec<TaskId> {
        self.accepting = false;
        self.tasks
            .iter_mut()
            .filter_map(|task| task.cancel().then(|| task.id()))
            .collect()
    }

    /// Return a skipped or permanently failed task to the pending set
    pub fn force_load(&mut self, id: &str) -> Result<TaskId, LoaderError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|task| task.descriptor().id() == id)
            .ok_or_else(|| LoaderError::UnknownResource(id.to_string()))?;
        if !task.revive() {
            return Err(LoaderError::NotForceLoadable {
                id: id.to_string(),
                state: task.state(),
            });
        }
        Ok(task.id())
    }

    fn task_mut(&mut self, id: TaskId) -> Option<&mut LoadTask> {
        self.tasks.iter_mut().find(|task| task.id() == id)
    }

    fn current(&mut self, id: TaskId, attempt: u32) -> Option<&mut LoadTask> {
        self.task_mut(id)
            .filter(|task| task.state() == TaskState::InFlight && task.attempt() == attempt)
    }
}
