//! Bounded-latency wrapper for provider and judge calls

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::providers::{ProviderError, ProviderResult};

/// Deadline plus cancellation for a single remote call.
///
/// Cloning shares the cancellation token, so one `cancel()` stops every
/// call made through any clone.
#[derive(Debug, Clone)]
pub struct Deadline {
    timeout: Duration,
    cancel: CancellationToken,
}

impl Deadline {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            cancel: CancellationToken::new(),
        }
    }

    /// Share an existing token instead of owning a fresh one
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// Run `call`, failing with `Timeout` or `Cancelled` if it does not finish in time
    pub async fn run<F, T>(&self, call: F) -> ProviderResult<T>
    where
        F: Future<Output = ProviderResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ProviderError::Cancelled),
            result = tokio::time::timeout(self.timeout, call) => match result {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout {
                    timeout_ms: self.timeout_ms(),
                }),
            },
        }
    }
}
