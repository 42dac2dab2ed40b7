// Event fan-out to session subscribers

use super::{LoaderEvent, ProgressUpdate, Throttle};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::time::Instant;

type Callback = Arc<dyn Fn(&LoaderEvent) + Send + Sync>;

struct ReporterState {
    subscribers: Vec<(u64, Callback)>,
    next_id: u64,
    /// Milestones already emitted, replayed to late subscribers
    milestones: Vec<LoaderEvent>,
    last_progress: Option<ProgressUpdate>,
    /// Newest update held back by the throttle
    pending_progress: Option<ProgressUpdate>,
    throttle: Throttle,
}

/// Publishes session events to every subscriber
///
/// Callbacks run on the session driver. They may drop their own
/// [`Subscription`] but must not subscribe again from inside a callback.
pub struct Reporter {
    state: Mutex<ReporterState>,
    /// Serializes deliveries so a late subscriber's replay never interleaves
    /// with live events
    delivery: Mutex<()>,
}

impl Reporter {
    pub fn new(progress_interval: Duration) -> Self {
        Self {
            state: Mutex::new(ReporterState {
                subscribers: Vec::new(),
                next_id: 0,
                milestones: Vec::new(),
                last_progress: None,
                pending_progress: None,
                throttle: Throttle::new(progress_interval),
            }),
            delivery: Mutex::new(()),
        }
    }

    /// Register a callback
    ///
    /// The callback first receives the milestones emitted so far and the latest
    /// progress value, then every live event until the subscription is dropped.
    pub fn subscribe<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&LoaderEvent) + Send + Sync + 'static,
    {
        let _delivery = self.lock_delivery();
        let callback: Callback = Arc::new(callback);

        let (id, replay) = {
            let mut state = self.lock_state();
            let id = state.next_id;
            state.next_id += 1;
            state.subscribers.push((id, callback.clone()));

            let mut replay = state.milestones.clone();
            if let Some(progress) = state.last_progress {
                replay.push(LoaderEvent::Progress(progress));
            }
            (id, replay)
        };

        for event in &replay {
            callback(event);
        }

        log::trace!("Subscriber {} registered ({} replayed)", id, replay.len());
        Subscription {
            reporter: Arc::downgrade(self),
            id,
            active: true,
        }
    }

    /// Publish an event to every subscriber
    pub fn emit(&self, event: LoaderEvent) {
        let _delivery = self.lock_delivery();
        let subscribers = {
            let mut state = self.lock_state();
            if event.is_milestone() {
                // only the latest tier and completion are replayed
                let repeatable = |e: &LoaderEvent| {
                    matches!(e, LoaderEvent::TierChanged(_) | LoaderEvent::AllComplete)
                };
                if repeatable(&event) {
                    let name = event.name();
                    state.milestones.retain(|m| m.name() != name);
                }
                state.milestones.push(event.clone());
            }
            if let LoaderEvent::Progress(update) = event {
                state.last_progress = Some(update);
                if state
                    .pending_progress
                    .map_or(false, |pending| pending.fraction <= update.fraction)
                {
                    state.pending_progress = None;
                }
            }
            state
                .subscribers
                .iter()
                .map(|(_, cb)| cb.clone())
                .collect::<Vec<_>>()
        };

        log::debug!("Event {} -> {} subscriber(s)", event.name(), subscribers.len());
        for callback in subscribers {
            callback(&event);
        }
    }

    /// Publish overall progress
    ///
    /// The fraction never decreases and values that would not advance it are
    /// dropped. Unforced updates are coalesced to one per interval: one that
    /// arrives early is held until [`Reporter::flush_progress`] runs at
    /// [`Reporter::progress_deadline`]. Returns whether an event was emitted.
    pub fn publish_progress(&self, update: ProgressUpdate, force: bool) -> bool {
        let update = {
            let mut state = self.lock_state();
            let floor = state.last_progress.map(|p| p.fraction).unwrap_or(0.0);
            let fraction = update.fraction.max(floor).min(1.0);

            let advances = match state.last_progress {
                Some(last) => fraction > last.fraction,
                None => true,
            };
            if !advances {
                return false;
            }
            let update = ProgressUpdate {
                fraction,
                determinate: update.determinate,
            };
            if force {
                state.throttle.mark();
            } else if !state.throttle.ready() {
                state.pending_progress = Some(update);
                return false;
            }
            update
        };

        log::trace!("Progress {:.3}", update.fraction);
        self.emit(LoaderEvent::Progress(update));
        true
    }

    /// When a held-back progress update is due, if there is one
    pub fn progress_deadline(&self) -> Option<Instant> {
        let state = self.lock_state();
        if state.pending_progress.is_none() {
            return None;
        }
        Some(state.throttle.next_open().unwrap_or_else(Instant::now))
    }

    /// Publish the update held back by the throttle
    pub fn flush_progress(&self) -> bool {
        let pending = self.lock_state().pending_progress.take();
        match pending {
            Some(update) => self.publish_progress(update, true),
            None => false,
        }
    }

    /// Latest published progress
    pub fn progress(&self) -> Option<ProgressUpdate> {
        self.lock_state().last_progress
    }

    /// Milestones emitted so far
    pub fn milestones(&self) -> Vec<LoaderEvent> {
        self.lock_state().milestones.clone()
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.lock_state().subscribers.len()
    }

    /// Drop every subscriber
    pub fn clear(&self) {
        self.lock_state().subscribers.clear();
    }

    fn unsubscribe(&self, id: u64) {
        self.lock_state().subscribers.retain(|(sub, _)| *sub != id);
        log::trace!("Subscriber {} removed", id);
    }

    fn lock_state(&self) -> MutexGuard<'_, ReporterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("subscribers", &self.subscriber_count())
            .field("progress", &self.progress())
            .finish()
    }
}

/// Handle to a registered callback; unsubscribes when dropped
#[must_use = "dropping a Subscription unsubscribes immediately"]
#[derive(Debug)]
pub struct Subscription {
    reporter: Weak<Reporter>,
    id: u64,
    active: bool,
}

impl Subscription {
    /// Stop receiving events
    pub fn unsubscribe(mut self) {
        self.detach();
    }

    /// Check if the reporter is still alive and this subscription registered
    pub fn is_active(&self) -> bool {
        self.active && self.reporter.strong_count() > 0
    }

    fn detach(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(reporter) = self.reporter.upgrade() {
            reporter.unsubscribe(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}
