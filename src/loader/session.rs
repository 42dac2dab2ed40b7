/// Loader session
///
/// A session is driven by a single tokio task that owns the critical-path
/// gate, the background queue, the policy monitor and every task state.
/// Fetches run as separate tokio tasks and report back over a channel tagged
/// with their attempt number, so results from aborted or superseded attempts
/// are recognised and dropped.
use super::{
    build, BackgroundQueue, ConfigError, CriticalPathGate, FailureAction, FetchError,
    FetchRequest, Fetcher, HttpFetcher, LoadTask, LoaderError, ProgressSink, RawDescriptor,
    ReadyResult, ResourceStore, StoreStats, TaskId, TaskSnapshot, TaskState,
};
use crate::core::LoaderOptions;
use crate::policy::{
    BatteryProvider, DefaultPolicy, MemoryPressureProvider, NetworkClassProvider, PolicyMonitor,
    QualityPolicy, QualityTier, Signal, SignalProviders, ThroughputEstimator, TierTable,
};
use crate::progress::{overall_progress, LoaderEvent, ProgressUpdate, Reporter, Subscription};
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::AbortHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Read-only view of a session
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub tier: QualityTier,
    /// Readiness, once decided
    pub ready: Option<ReadyResult>,
    /// Every task in load order
    pub tasks: Vec<TaskSnapshot>,
    pub progress: Option<ProgressUpdate>,
    /// Every task reached a terminal state
    pub all_complete: bool,
    pub disposed: bool,
}

impl SessionSnapshot {
    /// Find a task by resource id
    pub fn task(&self, id: &str) -> Option<&TaskSnapshot> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// State of a task by resource id
    pub fn state_of(&self, id: &str) -> Option<TaskState> {
        self.task(id).map(|task| task.state)
    }

    /// Number of tasks in a given state
    pub fn count(&self, state: TaskState) -> usize {
        self.tasks.iter().filter(|task| task.state == state).count()
    }
}

/// Messages processed by the session driver
enum Command {
    Progress {
        task: TaskId,
        attempt: u32,
        loaded: u64,
        total: Option<u64>,
    },
    Finished {
        task: TaskId,
        attempt: u32,
        result: Result<Vec<u8>, FetchError>,
        elapsed: Duration,
    },
    RetryDue {
        task: TaskId,
        attempt: u32,
    },
    Signal(Signal),
    ForceLoad {
        id: String,
        reply: oneshot::Sender<Result<(), LoaderError>>,
    },
    Dispose(Option<oneshot::Sender<()>>),
}

/// Configures and starts loader sessions
///
/// ```no_run
/// # async fn demo() -> Result<(), staged_loader::loader::ConfigError> {
/// use staged_loader::loader::{HttpFetcher, RawDescriptor, ResourceKind, StagedLoader};
/// use std::sync::Arc;
///
/// let session = StagedLoader::new(Arc::new(HttpFetcher::new())).start(vec![
///     RawDescriptor::new("bld", 1, ResourceKind::Model, "https://cdn.test/bld.glb").critical(),
///     RawDescriptor::new("furn", 2, ResourceKind::Model, "https://cdn.test/furn.glb"),
/// ])?;
/// let ready = session.await_ready().await;
/// # let _ = ready;
/// # Ok(())
/// # }
/// ```
pub struct StagedLoader {
    fetcher: Arc<dyn Fetcher>,
    options: LoaderOptions,
    policy: Option<Arc<dyn QualityPolicy>>,
    providers: SignalProviders,
    throughput: Option<Arc<ThroughputEstimator>>,
}

impl StagedLoader {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            options: LoaderOptions::default(),
            policy: None,
            providers: SignalProviders::default(),
            throughput: None,
        }
    }

    pub fn with_options(mut self, options: LoaderOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the default threshold policy
    pub fn with_policy(mut self, policy: impl QualityPolicy + 'static) -> Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    pub fn with_battery(mut self, provider: Arc<dyn BatteryProvider>) -> Self {
        self.providers.battery = Some(provider);
        self
    }

    pub fn with_memory(mut self, provider: Arc<dyn MemoryPressureProvider>) -> Self {
        self.providers.memory = Some(provider);
        self
    }

    pub fn with_network(mut self, provider: Arc<dyn NetworkClassProvider>) -> Self {
        self.providers.network = Some(provider);
        self
    }

    /// Classify the network from observed transfers
    ///
    /// The estimator becomes the network provider and is fed every
    /// successful fetch.
    pub fn with_throughput_estimator(mut self, estimator: Arc<ThroughputEstimator>) -> Self {
        self.providers.network = Some(estimator.clone());
        self.throughput = Some(estimator);
        self
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Validate the descriptors and start loading
    ///
    /// Validation happens before anything is fetched. The critical fetch and
    /// the first background admissions begin as soon as the runtime polls the
    /// session driver.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn start(&self, raw: Vec<RawDescriptor>) -> Result<LoaderSession, ConfigError> {
        let descriptors = build(raw)?;
        let options = &self.options;

        let mut critical = None;
        let mut background = Vec::with_capacity(descriptors.len());
        for (index, descriptor) in descriptors.into_iter().enumerate() {
            let task = LoadTask::new(TaskId(index), Arc::new(descriptor));
            if task.descriptor().is_critical() {
                critical = Some(task);
            } else {
                background.push(task);
            }
        }

        let gate = CriticalPathGate::new(critical, options.critical_retry.clone());
        let mut queue = BackgroundQueue::new(options.background_retry.clone());
        queue.enqueue_all(background);

        let policy: Arc<dyn QualityPolicy> = match &self.policy {
            Some(policy) => policy.clone(),
            None => Arc::new(DefaultPolicy::new(options.thresholds.clone())),
        };
        let reporter = Arc::new(Reporter::new(options.progress_interval));
        let store = Arc::new(ResourceStore::new());

        let (commands, inbox) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = watch::channel(gate.outcome().cloned());
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());

        let driver = Driver {
            gate,
            queue,
            monitor: PolicyMonitor::new(self.providers.clone(), policy),
            tiers: options.tiers.clone(),
            fetcher: self.fetcher.clone(),
            fetch_timeout: options.fetch_timeout,
            continue_after_critical_failure: options.continue_after_critical_failure,
            throughput: self.throughput.clone(),
            reporter: reporter.clone(),
            store: store.clone(),
            commands: commands.clone(),
            jobs: HashMap::new(),
            ready_tx,
            snapshot_tx,
            complete: false,
            disposed: false,
        };
        driver.publish_snapshot();
        tokio::spawn(driver.run(inbox, options.signal_poll_interval));

        Ok(LoaderSession {
            commands,
            ready: ready_rx,
            snapshot: snapshot_rx,
            reporter,
            store,
            disposed: AtomicBool::new(false),
        })
    }
}

impl std::fmt::Debug for StagedLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedLoader")
            .field("options", &self.options)
            .field("custom_policy", &self.policy.is_some())
            .field("providers", &self.providers)
            .field("throughput", &self.throughput.is_some())
            .finish()
    }
}

/// Start a session that fetches over HTTP(S)
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub fn start(raw: Vec<RawDescriptor>, options: LoaderOptions) -> Result<LoaderSession, ConfigError> {
    StagedLoader::new(Arc::new(HttpFetcher::new()))
        .with_options(options)
        .start(raw)
}

/// Handle to a running session
///
/// Dropping the handle disposes the session.
#[derive(Debug)]
pub struct LoaderSession {
    commands: mpsc::UnboundedSender<Command>,
    ready: watch::Receiver<Option<ReadyResult>>,
    snapshot: watch::Receiver<SessionSnapshot>,
    reporter: Arc<Reporter>,
    store: Arc<ResourceStore>,
    disposed: AtomicBool,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::Progress { .. } => "Progress",
            Command::Finished { .. } => "Finished",
            Command::RetryDue { .. } => "RetryDue",
            Command::Signal(_) => "Signal",
            Command::ForceLoad { .. } => "ForceLoad",
            Command::Dispose(_) => "Dispose",
        };
        f.write_str(name)
    }
}

impl LoaderSession {
    /// Wait until readiness is decided
    ///
    /// Resolves immediately when the session has no critical resource, and
    /// with `CriticalLoadFailed(Cancelled)` when the session is disposed
    /// first.
    pub async fn await_ready(&self) -> ReadyResult {
        let mut ready = self.ready.clone();
        let outcome = match ready.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        outcome
            .or_else(|| ready.borrow().clone())
            .unwrap_or(ReadyResult::CriticalLoadFailed(FetchError::Cancelled))
    }

    /// Readiness if already decided
    pub fn ready_result(&self) -> Option<ReadyResult> {
        self.ready.borrow().clone()
    }

    /// Receive session events
    ///
    /// Milestones emitted before the call are replayed first.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&LoaderEvent) + Send + Sync + 'static,
    {
        self.reporter.subscribe(callback)
    }

    /// Abort every fetch and cancel unsettled tasks
    ///
    /// Completed payloads stay readable. Calling it again is a no-op.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let (reply, done) = oneshot::channel();
        if self.commands.send(Command::Dispose(Some(reply))).is_ok() {
            let _ = done.await;
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Load a skipped or permanently failed resource regardless of tier
    pub async fn force_load(&self, id: &str) -> Result<(), LoaderError> {
        if self.is_disposed() {
            return Err(LoaderError::Disposed);
        }
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::ForceLoad {
                id: id.to_string(),
                reply,
            })
            .map_err(|_| LoaderError::Disposed)?;
        response.await.map_err(|_| LoaderError::Disposed)?
    }

    /// Feed a device reading to the quality policy
    pub fn push_signal(&self, signal: Signal) -> Result<(), LoaderError> {
        if self.is_disposed() {
            return Err(LoaderError::Disposed);
        }
        self.commands
            .send(Command::Signal(signal))
            .map_err(|_| LoaderError::Disposed)
    }

    /// Latest published state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Wait for a published state matching `predicate`
    ///
    /// Returns the last state if the session stops first.
    pub async fn wait_until<F>(&self, mut predicate: F) -> SessionSnapshot
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        let mut snapshots = self.snapshot.clone();
        let found = match snapshots.wait_for(|s| predicate(s)).await {
            Ok(snapshot) => Some(snapshot.clone()),
            Err(_) => None,
        };
        found.unwrap_or_else(|| snapshots.borrow().clone())
    }

    /// Payload of a loaded resource
    pub fn resource(&self, id: &str) -> Option<Arc<[u8]>> {
        self.store.get(id)
    }

    pub fn store_stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Latest published overall progress
    pub fn progress(&self) -> Option<ProgressUpdate> {
        self.reporter.progress()
    }
}

impl Drop for LoaderSession {
    fn drop(&mut self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            let _ = self.commands.send(Command::Dispose(None));
        }
    }
}

/// Owner of all mutable session state
struct Driver {
    gate: CriticalPathGate,
    queue: BackgroundQueue,
    monitor: PolicyMonitor,
    tiers: TierTable,
    fetcher: Arc<dyn Fetcher>,
    fetch_timeout: Option<Duration>,
    continue_after_critical_failure: bool,
    throughput: Option<Arc<ThroughputEstimator>>,
    reporter: Arc<Reporter>,
    store: Arc<ResourceStore>,
    commands: mpsc::UnboundedSender<Command>,
    /// Running fetch or retry timer per task
    jobs: HashMap<TaskId, AbortHandle>,
    ready_tx: watch::Sender<Option<ReadyResult>>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    complete: bool,
    disposed: bool,
}

impl Driver {
    async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<Command>,
        poll_interval: Option<Duration>,
    ) {
        self.launch();
        self.publish_snapshot();

        let mut poll = poll_interval.filter(|p| !p.is_zero()).map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            let flush_at = self.reporter.progress_deadline();
            let flow = tokio::select! {
                command = inbox.recv() => match command {
                    Some(command) => self.handle(command),
                    None => {
                        self.dispose();
                        ControlFlow::Break(())
                    }
                },
                _ = next_tick(&mut poll) => {
                    self.poll_signals();
                    ControlFlow::Continue(())
                }
                _ = deadline(flush_at) => {
                    self.reporter.flush_progress();
                    ControlFlow::Continue(())
                }
            };
            if flow.is_break() {
                break;
            }
            self.publish_snapshot();
        }
        log::debug!("Loader driver stopped");
    }

    fn launch(&mut self) {
        log::info!(
            "Loading {} resource(s), critical: {}",
            self.queue.len() + usize::from(self.gate.task().is_some()),
            self.gate
                .task()
                .map(|task| task.descriptor().id())
                .unwrap_or("none")
        );

        if let Some(tier) = self.monitor.poll() {
            self.reporter.emit(LoaderEvent::TierChanged(tier));
        }

        match self.gate.task_id() {
            None => self.reporter.emit(LoaderEvent::CriticalReady),
            Some(task) => {
                if let Some(attempt) = self.gate.start() {
                    self.spawn_fetch(task, attempt);
                }
            }
        }

        self.pump();
        self.settle();
    }

    fn handle(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Progress {
                task,
                attempt,
                loaded,
                total,
            } => {
                let recorded = if self.gate.owns(task) {
                    self.gate.record_progress(attempt, loaded, total)
                } else {
                    self.queue.record_progress(task, attempt, loaded, total)
                };
                if recorded {
                    log::trace!("Task {} received {} / {:?} bytes", task.index(), loaded, total);
                    self.refresh_progress(false);
                }
            }
            Command::Finished {
                task,
                attempt,
                result,
                elapsed,
            } => match result {
                Ok(bytes) => self.on_success(task, attempt, bytes, elapsed),
                Err(error) => self.on_failure(task, attempt, error),
            },
            Command::RetryDue { task, attempt } => {
                let next = if self.gate.owns(task) {
                    self.gate.begin_retry(attempt)
                } else {
                    self.queue.begin_retry(task, attempt)
                };
                if let Some(next) = next {
                    self.spawn_fetch(task, next);
                }
            }
            Command::Signal(signal) => {
                if let Some(tier) = self.monitor.push(signal) {
                    self.on_tier_changed(tier);
                }
            }
            Command::ForceLoad { id, reply } => {
                let _ = reply.send(self.force_load(&id));
            }
            Command::Dispose(reply) => {
                self.dispose();
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Admit background work allowed by the current tier
    fn pump(&mut self) {
        let admission = self.queue.admit(self.tiers.profile(self.monitor.tier()));
        for task in admission.skipped {
            self.announce_skip(task);
        }
        for (task, attempt) in admission.started {
            self.spawn_fetch(task, attempt);
        }
    }

    fn spawn_fetch(&mut self, task: TaskId, attempt: u32) {
        let tier = self.monitor.tier();
        let Some(request) = self.task(task).map(|t| FetchRequest {
            task,
            id: t.descriptor().id().to_string(),
            uri: t.descriptor().uri().clone(),
            kind: t.kind(),
            attempt,
            tier,
        }) else {
            return;
        };
        log::debug!("Fetching {} (attempt {}, {} tier)", request.id, attempt, tier);

        let fetcher = self.fetcher.clone();
        let commands = self.commands.clone();
        let timeout = self.fetch_timeout;
        let progress = {
            let commands = commands.clone();
            ProgressSink::new(move |loaded, total| {
                let _ = commands.send(Command::Progress {
                    task,
                    attempt,
                    loaded,
                    total,
                });
            })
        };

        let job = tokio::spawn(async move {
            let started = Instant::now();
            let transfer = fetcher.fetch(&request, &progress);
            let result = match timeout {
                Some(limit) => tokio::time::timeout(limit, transfer)
                    .await
                    .unwrap_or(Err(FetchError::Timeout(limit))),
                None => transfer.await,
            };
            let _ = commands.send(Command::Finished {
                task,
                attempt,
                result,
                elapsed: started.elapsed(),
            });
        });
        self.track(task, job.abort_handle());
    }

    fn schedule_retry(&mut self, task: TaskId, attempt: u32, delay: Duration) {
        let commands = self.commands.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = commands.send(Command::RetryDue { task, attempt });
        });
        self.track(task, timer.abort_handle());
    }

    fn track(&mut self, task: TaskId, job: AbortHandle) {
        if let Some(previous) = self.jobs.insert(task, job) {
            previous.abort();
        }
    }

    fn on_success(&mut self, task: TaskId, attempt: u32, bytes: Vec<u8>, elapsed: Duration) {
        let size = bytes.len() as u64;
        let critical = self.gate.owns(task);
        let accepted = if critical {
            self.gate.on_success(attempt, size)
        } else {
            self.queue.on_success(task, attempt, size)
        };
        if !accepted {
            log::trace!("Dropping stale result for task {} attempt {}", task.index(), attempt);
            return;
        }
        self.jobs.remove(&task);

        let id = self.resource_id(task);
        self.store.insert(&id, bytes);
        log::debug!("Loaded {} ({} bytes in {:?})", id, size, elapsed);
        self.reporter.emit(LoaderEvent::TaskSucceeded {
            id: id.clone(),
            bytes: size,
        });

        if critical {
            log::info!("Critical resource {} ready", id);
            self.publish_ready();
            self.reporter.emit(LoaderEvent::CriticalReady);
        }

        self.observe_throughput(size, elapsed);
        self.pump();
        self.settle();
    }

    fn on_failure(&mut self, task: TaskId, attempt: u32, error: FetchError) {
        let scale = self.tiers.profile(self.monitor.tier()).backoff_scale;
        let critical = self.gate.owns(task);
        let action = if critical {
            self.gate.on_failure(attempt, error.clone(), scale)
        } else {
            self.queue.on_failure(task, attempt, error.clone(), scale)
        };
        let Some(action) = action else {
            log::trace!("Dropping stale failure for task {} attempt {}", task.index(), attempt);
            return;
        };
        self.jobs.remove(&task);

        let id = self.resource_id(task);
        match action {
            FailureAction::Retry(delay) => {
                log::warn!(
                    "Attempt {} for {} failed: {}, retrying in {:?}",
                    attempt,
                    id,
                    error,
                    delay
                );
                self.reporter.emit(LoaderEvent::TaskRetrying {
                    id,
                    attempt,
                    delay,
                    error,
                });
                self.schedule_retry(task, attempt, delay);
            }
            FailureAction::GiveUp => {
                log::warn!("Giving up on {} after {} attempt(s): {}", id, attempt, error);
                self.reporter.emit(LoaderEvent::TaskFailed {
                    id,
                    error: error.clone(),
                });
                if critical {
                    self.critical_failed(error);
                }
            }
        }

        self.pump();
        self.settle();
    }

    fn critical_failed(&mut self, error: FetchError) {
        self.publish_ready();
        self.reporter.emit(LoaderEvent::CriticalFailed(error));
        if !self.continue_after_critical_failure {
            let cancelled = self.queue.stop_admitting();
            log::info!(
                "Background loading stopped, {} pending task(s) cancelled",
                cancelled.len()
            );
        }
    }

    fn on_tier_changed(&mut self, tier: QualityTier) {
        self.reporter.emit(LoaderEvent::TierChanged(tier));
        let profile = self.tiers.profile(tier);
        let skipped = self.queue.apply_tier(profile);
        let demoted = self.queue.demote_excess(profile.cap());
        for task in skipped {
            self.announce_skip(task);
        }
        for task in demoted {
            if let Some(job) = self.jobs.remove(&task) {
                job.abort();
            }
            log::info!(
                "Deferring {} to fit the {} tier cap",
                self.resource_id(task),
                tier
            );
        }
        self.pump();
        self.settle();
    }

    fn announce_skip(&self, task: TaskId) {
        let id = self.resource_id(task);
        log::info!("Skipping {} at {} tier", id, self.monitor.tier());
        self.reporter.emit(LoaderEvent::TaskSkipped { id });
    }

    fn poll_signals(&mut self) {
        if let Some(tier) = self.monitor.poll() {
            self.on_tier_changed(tier);
        }
    }

    fn observe_throughput(&mut self, bytes: u64, elapsed: Duration) {
        let Some(estimator) = self.throughput.clone() else {
            return;
        };
        estimator.record(bytes, elapsed);
        let class = estimator.network_class();
        if let Some(tier) = self.monitor.push(Signal::Network(class)) {
            self.on_tier_changed(tier);
        }
    }

    fn force_load(&mut self, id: &str) -> Result<(), LoaderError> {
        if let Some(task) = self.gate.task().filter(|t| t.descriptor().id() == id) {
            return Err(LoaderError::NotForceLoadable {
                id: id.to_string(),
                state: task.state(),
            });
        }
        self.queue.force_load(id)?;
        log::info!("Force-loading {}", id);
        self.complete = false;
        self.pump();
        self.settle();
        Ok(())
    }

    /// Publish progress and announce completion once everything settled
    fn settle(&mut self) {
        self.refresh_progress(true);

        let critical_settled = self.gate.task().map_or(true, LoadTask::is_terminal);
        if self.complete
            || self.disposed
            || !self.gate.is_decided()
            || !critical_settled
            || !self.queue.is_settled()
        {
            return;
        }
        self.complete = true;

        let determinate = self.reporter.progress().map_or(false, |p| p.determinate);
        self.reporter.publish_progress(
            ProgressUpdate {
                fraction: 1.0,
                determinate,
            },
            true,
        );
        let stats = self.store.stats();
        log::info!(
            "All resources settled: {} loaded, {} bytes",
            stats.resource_count,
            stats.total_bytes
        );
        self.reporter.emit(LoaderEvent::AllComplete);
    }

    fn refresh_progress(&self, force: bool) {
        let update = overall_progress(&self.task_snapshots());
        self.reporter.publish_progress(update, force);
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        for (_, job) in self.jobs.drain() {
            job.abort();
        }
        let mut cancelled = self.queue.cancel_all().len();
        if self.gate.cancel() {
            cancelled += 1;
        }
        self.publish_ready();

        log::info!("Loader session disposed, {} task(s) cancelled", cancelled);
        self.reporter.emit(LoaderEvent::Disposed);
        self.reporter.clear();
        self.publish_snapshot();
    }

    /// Copy the gate's decision to waiters; readiness never changes once set
    fn publish_ready(&self) {
        let Some(outcome) = self.gate.outcome() else {
            return;
        };
        self.ready_tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(outcome.clone());
            true
        });
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(SessionSnapshot {
            tier: self.monitor.tier(),
            ready: self.gate.outcome().cloned(),
            tasks: self.task_snapshots(),
            progress: self.reporter.progress(),
            all_complete: self.complete,
            disposed: self.disposed,
        });
    }

    fn task(&self, task: TaskId) -> Option<&LoadTask> {
        self.gate
            .task()
            .filter(|t| t.id() == task)
            .or_else(|| self.queue.get(task))
    }

    fn resource_id(&self, task: TaskId) -> String {
        self.task(task)
            .map(|t| t.descriptor().id().to_string())
            .unwrap_or_default()
    }

    fn task_snapshots(&self) -> Vec<TaskSnapshot> {
        let mut tasks: Vec<&LoadTask> = self.gate.task().into_iter().chain(self.queue.tasks()).collect();
        tasks.sort_by_key(|task| task.id());
        tasks.into_iter().map(LoadTask::snapshot).collect()
    }
}

async fn next_tick(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn deadline(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
