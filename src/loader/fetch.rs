// Fetch adapter: byte transfer for a single resource

use super::{FetchError, ResourceKind, TaskId};
use crate::policy::QualityTier;
use async_trait::async_trait;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;

/// Connect timeout used by the default HTTP client
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for preallocating a body buffer from `Content-Length`
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// Everything a fetcher needs to know about one attempt
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub task: TaskId,
    pub id: String,
    pub uri: Url,
    pub kind: ResourceKind,
    /// 1-based attempt number
    pub attempt: u32,
    /// Quality tier snapshotted when the attempt was admitted
    pub tier: QualityTier,
}

type ProgressFn = dyn Fn(u64, Option<u64>) + Send + Sync;

/// Receives `(bytes_loaded, bytes_total)` updates from a running fetch
#[derive(Clone)]
pub struct ProgressSink {
    report: Arc<ProgressFn>,
}

impl ProgressSink {
    pub fn new<F>(report: F) -> Self
    where
        F: Fn(u64, Option<u64>) + Send + Sync + 'static,
    {
        Self {
            report: Arc::new(report),
        }
    }

    /// A sink that drops every update
    pub fn discard() -> Self {
        Self::new(|_, _| {})
    }

    /// Report the bytes received so far; `total` is `None` when unknown
    pub fn report(&self, loaded: u64, total: Option<u64>) {
        (self.report)(loaded, total);
    }
}

impl std::fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProgressSink")
    }
}

/// Transfers the bytes of one resource
///
/// Implementations must be cancel-safe: the session aborts a fetch by dropping
/// its future, and whatever was received so far is discarded.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: &ProgressSink,
    ) -> Result<Vec<u8>, FetchError>;
}

/// HTTP(S) fetcher backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with the default connect timeout
    pub fn new() -> Self {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a fetcher that gives up connecting after `timeout`
    pub fn with_connect_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self { client }
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: &ProgressSink,
    ) -> Result<Vec<u8>, FetchError> {
        match request.uri.scheme() {
            "http" | "https" => {}
            other => return Err(FetchError::UnsupportedScheme(other.to_string())),
        }

        let mut response = self
            .client
            .get(request.uri.clone())
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                uri: request.uri.to_string(),
            });
        }

        let total = response.content_length();
        let mut body = Vec::with_capacity(total.unwrap_or(0).min(MAX_PREALLOCATION) as usize);
        progress.report(0, total);

        while let Some(chunk) = response.chunk().await.map_err(network_error)? {
            body.extend_from_slice(&chunk);
            progress.report(body.len() as u64, total);
        }

        log::trace!(
            "Fetched {} ({} bytes, attempt {})",
            request.id,
            body.len(),
            request.attempt
        );
        Ok(body)
    }
}

fn network_error(error: reqwest::Error) -> FetchError {
    if let Some(status) = error.status() {
        return FetchError::Status {
            status: status.as_u16(),
            uri: error.url().map(|u| u.to_string()).unwrap_or_default(),
        };
    }
    FetchError::Network(error.to_string())
}
