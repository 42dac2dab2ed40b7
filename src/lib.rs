//! Staged resource loading
//!
//! Loads one critical resource ahead of everything else, streams the rest
//! through a concurrency-capped background queue, and scales that queue down
//! when battery, memory or network signals say the device is struggling.
//!
//! Sessions are started with [`loader::StagedLoader`] (or [`loader::start`] for
//! plain HTTP) and must run inside a tokio runtime.

pub mod core;
pub mod loader;
pub mod policy;
pub mod progress;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::core::LoaderOptions;
pub use loader::{
    start, ConfigError, FetchError, LoaderError, LoaderSession, RawDescriptor, ReadyResult,
    ResourceKind, StagedLoader,
};
pub use policy::{QualityTier, Signal};
pub use progress::{LoaderEvent, ProgressUpdate, Subscription};
