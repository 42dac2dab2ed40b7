// Progress & status reporting
//
// Aggregates per-task byte counts into one monotonic fraction and fans out
// lifecycle events to subscribers.

mod aggregate;
mod events;
mod reporter;
mod throttle;

pub use aggregate::overall_progress;
pub use events::{LoaderEvent, ProgressUpdate};
pub use reporter::{Reporter, Subscription};
pub use throttle::Throttle;
