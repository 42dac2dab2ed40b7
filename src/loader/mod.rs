// Staged loading system
//
// Validates a resource manifest, fetches the critical resource ahead of
// everything else and streams the rest through a concurrency-capped queue.

mod descriptor;
mod fetch;
mod gate;
mod queue;
mod retry;
mod session;
mod store;
mod task;

pub use descriptor::{build, Manifest, RawDescriptor, ResourceDescriptor, ResourceKind};
pub use fetch::{FetchRequest, Fetcher, HttpFetcher, ProgressSink};
pub use gate::{CriticalPathGate, ReadyResult};
pub use queue::{Admission, BackgroundQueue};
pub use retry::{FailureAction, RetryPolicy};
pub use session::{start, LoaderSession, SessionSnapshot, StagedLoader};
pub use store::{ResourceStore, StoreStats};
pub use task::{LoadTask, TaskId, TaskSnapshot, TaskState};

use std::time::Duration;

/// Manifest validation errors, raised before anything is fetched
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Resource list is empty")]
    EmptyList,

    #[error("Resource at position {index} has an empty id")]
    EmptyId { index: usize },

    #[error("More than one critical resource: {first} and {second}")]
    MultipleCritical { first: String, second: String },

    #[error("Duplicate resource id: {0}")]
    DuplicateId(String),

    #[error("Invalid uri for {id} ({uri:?}): {reason}")]
    InvalidUri {
        id: String,
        uri: String,
        reason: String,
    },

    #[error("Malformed manifest: {0}")]
    Manifest(String),
}

/// Failure of a single fetch attempt
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP status {status} for {uri}")]
    Status { status: u16, uri: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unsupported uri scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Check if this failure came from the per-task timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout(_))
    }

    /// Check if another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::Cancelled | FetchError::UnsupportedScheme(_))
    }
}

/// Errors returned by session operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoaderError {
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Resource {id} cannot be force-loaded while {state}")]
    NotForceLoadable { id: String, state: TaskState },

    #[error("Loader session has been disposed")]
    Disposed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::DuplicateId("bld".to_string());
        assert_eq!(err.to_string(), "Duplicate resource id: bld");
    }

    #[test]
    fn test_fetch_error_retryable() {
        assert!(FetchError::Network("reset".into()).is_retryable());
        assert!(FetchError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(FetchError::Timeout(Duration::from_secs(1)).is_timeout());
        assert!(!FetchError::Cancelled.is_retryable());
        assert!(!FetchError::UnsupportedScheme("ftp".into()).is_retryable());
    }

    #[test]
    fn test_loader_error_display() {
        let err = LoaderError::NotForceLoadable {
            id: "bld".into(),
            state: TaskState::Succeeded,
        };
        assert_eq!(err.to_string(), "Resource bld cannot be force-loaded while succeeded");
    }
}
