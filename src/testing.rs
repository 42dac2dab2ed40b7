// Scripted collaborators for session tests

use crate::loader::{FetchError, FetchRequest, Fetcher, LoaderSession, ProgressSink};
use crate::policy::{BatteryProvider, BatteryStatus, MemoryPressureProvider};
use crate::progress::{LoaderEvent, Subscription};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What one fetch attempt does
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// Deliver `bytes` bytes in two halves over `delay`
    Succeed { bytes: usize, delay: Duration },
    /// Fail with `error` after `delay`
    Fail { error: FetchError, delay: Duration },
    /// Report `loaded` of `total` bytes after `delay`, then never finish
    Stall {
        loaded: u64,
        total: u64,
        delay: Duration,
    },
    /// Never finish
    Hang,
}

impl Step {
    pub(crate) fn ok(bytes: usize, millis: u64) -> Self {
        Step::Succeed {
            bytes,
            delay: Duration::from_millis(millis),
        }
    }

    pub(crate) fn fail(millis: u64) -> Self {
        Step::Fail {
            error: FetchError::Network("connection reset".into()),
            delay: Duration::from_millis(millis),
        }
    }
}

/// Fetcher that plays back per-resource scripts
///
/// Resources without a script (or whose script ran out) use the default step.
pub(crate) struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    fallback: Step,
    started: Mutex<Vec<(String, u32)>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback: Step::ok(1000, 20),
            started: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_fallback(mut self, step: Step) -> Self {
        self.fallback = step;
        self
    }

    pub(crate) fn script(self, id: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(id.to_string(), steps.into());
        self
    }

    /// Every attempt started so far, in start order
    pub(crate) fn started(&self) -> Vec<(String, u32)> {
        self.started.lock().unwrap().clone()
    }

    pub(crate) fn attempts(&self, id: &str) -> usize {
        self.started().iter().filter(|(s, _)| s == id).count()
    }

    /// Highest number of fetches running at once
    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Fetches currently running; aborted ones are released when dropped
    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn next_step(&self, id: &str) -> Step {
        self.scripts
            .lock()
            .unwrap()
            .get_mut(id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.fallback.clone())
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: &ProgressSink,
    ) -> Result<Vec<u8>, FetchError> {
        self.started
            .lock()
            .unwrap()
            .push((request.id.clone(), request.attempt));
        let step = self.next_step(&request.id);
        let _slot = InFlight::enter(&self.in_flight, &self.peak);

        match step {
            Step::Succeed { bytes, delay } => {
                let total = Some(bytes as u64);
                progress.report(0, total);
                tokio::time::sleep(delay / 2).await;
                progress.report(bytes as u64 / 2, total);
                tokio::time::sleep(delay / 2).await;
                progress.report(bytes as u64, total);
                Ok(vec![7; bytes])
            }
            Step::Fail { error, delay } => {
                tokio::time::sleep(delay).await;
                Err(error)
            }
            Step::Stall {
                loaded,
                total,
                delay,
            } => {
                progress.report(0, Some(total));
                tokio::time::sleep(delay).await;
                progress.report(loaded, Some(total));
                std::future::pending().await
            }
            Step::Hang => std::future::pending().await,
        }
    }
}

/// Battery reading that tests can change between polls
pub(crate) struct FakeBattery(pub(crate) Mutex<Option<BatteryStatus>>);

impl FakeBattery {
    pub(crate) fn new(level: f32, charging: bool) -> Self {
        Self(Mutex::new(Some(BatteryStatus::new(level, charging))))
    }

    pub(crate) fn set(&self, level: f32, charging: bool) {
        *self.0.lock().unwrap() = Some(BatteryStatus::new(level, charging));
    }
}

impl BatteryProvider for FakeBattery {
    fn battery(&self) -> Option<BatteryStatus> {
        *self.0.lock().unwrap()
    }
}

/// Constant memory pressure
pub(crate) struct FixedPressure(pub(crate) f32);

impl MemoryPressureProvider for FixedPressure {
    fn memory_pressure(&self) -> Option<f32> {
        Some(self.0)
    }
}

/// Subscriber that keeps every event it sees
pub(crate) struct Recorder {
    events: Arc<Mutex<Vec<LoaderEvent>>>,
    _subscription: Subscription,
}

impl Recorder {
    pub(crate) fn attach(session: &LoaderSession) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let subscription = session.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        Self {
            events,
            _subscription: subscription,
        }
    }

    pub(crate) fn events(&self) -> Vec<LoaderEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Index of the first event matching `predicate`
    pub(crate) fn position(&self, predicate: impl Fn(&LoaderEvent) -> bool) -> Option<usize> {
        self.events().iter().position(predicate)
    }

    pub(crate) fn count(&self, predicate: impl Fn(&LoaderEvent) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }

    /// Fractions of every progress event, in order
    pub(crate) fn fractions(&self) -> Vec<f64> {
        self.events()
            .iter()
            .filter_map(|event| match event {
                LoaderEvent::Progress(update) => Some(update.fraction),
                _ => None,
            })
            .collect()
    }
}
