// Per-resource load task and its state machine

use super::{FetchError, ResourceDescriptor, ResourceKind};
use std::sync::Arc;

/// Index of a task within its session's sorted descriptor list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    /// Get the raw index
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Lifecycle state of a load task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskState {
    /// Waiting to be admitted
    #[default]
    Pending,
    /// A fetch attempt is running
    InFlight,
    /// Payload received
    Succeeded,
    /// Last attempt failed; terminal unless a retry is scheduled
    Failed,
    /// Aborted by disposal or by a critical failure
    Cancelled,
    /// Dropped by the quality policy before it started
    Skipped,
}

impl TaskState {
    /// Check if the state can never change without caller intervention
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Cancelled | Self::Skipped
        )
    }

    /// Check if a transition to `next` is allowed
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        match (self, next) {
            (Pending, InFlight) | (Pending, Skipped) => true,
            (InFlight, Succeeded) | (InFlight, Failed) => true,
            // preempted by a lower concurrency cap
            (InFlight, Pending) => true,
            (Failed, InFlight) => true,
            // force-load revives skipped or exhausted tasks
            (Skipped, Pending) | (Failed, Pending) => true,
            (Pending | InFlight | Failed, Cancelled) => true,
            _ => false,
        }
    }

    /// Get the lowercase name of this state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in-flight",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime state for loading one descriptor
#[derive(Debug, Clone)]
pub struct LoadTask {
    id: TaskId,
    descriptor: Arc<ResourceDescriptor>,
    state: TaskState,
    bytes_loaded: Option<u64>,
    bytes_total: Option<u64>,
    attempt: u32,
    last_error: Option<FetchError>,
    retry_pending: bool,
    forced: bool,
    /// Attempts aborted by a tier downgrade; they do not count against the
    /// retry budget
    preempted: u32,
}

impl LoadTask {
    pub fn new(id: TaskId, descriptor: Arc<ResourceDescriptor>) -> Self {
        Self {
            id,
            descriptor,
            state: TaskState::Pending,
            bytes_loaded: None,
            bytes_total: None,
            attempt: 0,
            last_error: None,
            retry_pending: false,
            forced: false,
            preempted: 0,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn descriptor(&self) -> &Arc<ResourceDescriptor> {
        &self.descriptor
    }

    pub fn kind(&self) -> ResourceKind {
        self.descriptor.kind()
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn bytes_loaded(&self) -> Option<u64> {
        self.bytes_loaded
    }

    pub fn bytes_total(&self) -> Option<u64> {
        self.bytes_total
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    /// Check if the task failed and is waiting for its backoff timer
    pub fn is_retry_pending(&self) -> bool {
        self.state == TaskState::Failed && self.retry_pending
    }

    /// Check if the task was revived by a force-load
    pub fn is_forced(&self) -> bool {
        self.forced
    }

    /// Check if the task was ever sent back to the pending set
    pub fn is_preempted(&self) -> bool {
        self.preempted > 0
    }

    /// Attempts that count against the retry budget
    pub fn budgeted_attempts(&self) -> u32 {
        self.attempt.saturating_sub(self.preempted)
    }

    /// Check if the task reached a state it will not leave on its own
    pub fn is_terminal(&self) -> bool {
        self.state.is_settled() && !self.is_retry_pending()
    }

    /// Check if the task occupies a loading slot
    pub fn is_active(&self) -> bool {
        self.state == TaskState::InFlight || self.is_retry_pending()
    }

    /// Start a fetch attempt; returns the new attempt number
    pub fn begin_attempt(&mut self) -> u32 {
        self.transition(TaskState::InFlight);
        self.attempt += 1;
        self.bytes_loaded = None;
        self.retry_pending = false;
        self.attempt
    }

    /// Record byte progress of the current attempt
    pub fn record_progress(&mut self, loaded: u64, total: Option<u64>) {
        if self.state != TaskState::InFlight {
            return;
        }
        self.bytes_loaded = Some(loaded);
        if total.is_some() {
            self.bytes_total = total;
        }
    }

    /// Mark the current attempt as successful
    pub fn succeed(&mut self, bytes: u64) {
        self.transition(TaskState::Succeeded);
        self.bytes_loaded = Some(bytes);
        if self.bytes_total.is_none() {
            self.bytes_total = Some(bytes);
        }
        self.last_error = None;
    }

    /// Mark the current attempt as failed
    pub fn fail(&mut self, error: FetchError, retry_scheduled: bool) {
        self.transition(TaskState::Failed);
        self.last_error = Some(error);
        self.retry_pending = retry_scheduled;
    }

    /// Drop the task before it starts
    pub fn skip(&mut self) {
        self.transition(TaskState::Skipped);
    }

    /// Give up the task's loading slot and wait for admission again
    ///
    /// An aborted in-flight attempt is not charged to the retry budget; a
    /// retry timer that was pending is dropped, keeping its failed attempt.
    pub fn requeue(&mut self) -> bool {
        match self.state {
            TaskState::InFlight => self.preempted += 1,
            TaskState::Failed if self.retry_pending => {}
            _ => return false,
        }
        self.transition(TaskState::Pending);
        self.bytes_loaded = None;
        self.retry_pending = false;
        true
    }

    /// Abort the task; no-op on tasks that already settled
    pub fn cancel(&mut self) -> bool {
        if self.state.can_transition_to(TaskState::Cancelled)
            && (self.state != TaskState::Failed || self.retry_pending)
        {
            self.state = TaskState::Cancelled;
            self.bytes_loaded = None;
            self.retry_pending = false;
            true
        } else {
            false
        }
    }

    /// Return a skipped or permanently failed task to the pending set
    pub fn revive(&mut self) -> bool {
        let revivable = match self.state {
            TaskState::Skipped => true,
            TaskState::Failed => !self.retry_pending,
            _ => false,
        };
        if !revivable {
            return false;
        }
        self.transition(TaskState::Pending);
        self.attempt = 0;
        self.preempted = 0;
        self.bytes_loaded = None;
        self.last_error = None;
        self.forced = true;
        true
    }

    /// Capture a read-only view for reporting
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.descriptor.id().to_string(),
            kind: self.kind(),
            is_critical: self.descriptor.is_critical(),
            state: self.state,
            bytes_loaded: self.bytes_loaded,
            bytes_total: self.bytes_total,
            attempt: self.attempt,
            last_error: self.last_error.clone(),
            retry_pending: self.is_retry_pending(),
        }
    }

    fn transition(&mut self, next: TaskState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {} for {}",
            self.state,
            next,
            self.descriptor.id()
        );
        if !self.state.can_transition_to(next) {
            log::warn!(
                "Ignoring invalid transition {} -> {} for {}",
                self.state,
                next,
                self.descriptor.id()
            );
            return;
        }
        self.state = next;
    }
}

/// Read-only copy of a task's state
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    pub id: String,
    pub kind: ResourceKind,
    pub is_critical: bool,
    pub state: TaskState,
    pub bytes_loaded: Option<u64>,
    pub bytes_total: Option<u64>,
    pub attempt: u32,
    pub last_error: Option<FetchError>,
    pub retry_pending: bool,
}

impl TaskSnapshot {
    /// Check if the task will not change state on its own
    pub fn is_terminal(&self) -> bool {
        self.state.is_settled() && !self.retry_pending
    }
}
