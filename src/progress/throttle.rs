// Rate limiting for high-frequency progress updates

use tokio::time::{Duration, Instant};

/// Lets an update through at most once per interval
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Check if an update may pass now, and record it if so
    pub fn ready(&mut self) -> bool {
        self.ready_at(Instant::now())
    }

    /// Check if an update may pass at `now`, and record it if so
    pub fn ready_at(&mut self, now: Instant) -> bool {
        let open = match self.last {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        };
        if open {
            self.last = Some(now);
        }
        open
    }

    /// Earliest instant the next update may pass
    pub fn next_open(&self) -> Option<Instant> {
        self.last.map(|last| last + self.interval)
    }

    /// Record an update that bypassed the throttle
    pub fn mark(&mut self) {
        self.last = Some(Instant::now());
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
