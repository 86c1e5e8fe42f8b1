//! Retrying Writer
//!
//! Read-mutate-write loop over a [`RemoteFileStore`]. Each attempt re-reads
//! the file and recomputes the mutation from the fresh content, so a retry
//! after a version conflict never reuses a stale result.

use crate::error::{ApiError, StoreError};
use crate::store::RemoteFileStore;
use crate::types::{FileSnapshot, VersionToken};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Retry and timeout settings for one write operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Upper bound of the random delay added to each backoff
    pub jitter: Duration,
    /// Deadline for each individual store call
    pub op_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(3),
            jitter: Duration::from_millis(100),
            op_timeout: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    /// Policy with no waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter: Duration::ZERO,
            op_timeout: Duration::from_secs(5),
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` counts from 1
    ///
    /// Doubles per attempt from `base_backoff`, capped at `max_backoff`, plus
    /// up to `jitter` of noise.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let scaled = self
            .base_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff);
        scaled + self.jitter_sample()
    }

    fn jitter_sample(&self) -> Duration {
        let bound = self.jitter.as_millis() as u64;
        if bound == 0 {
            return Duration::ZERO;
        }
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos() as u64)
            .unwrap_or(0);
        Duration::from_millis(nanos % (bound + 1))
    }
}

/// Outcome of recomputing a file's content from its current state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Replace the file with this content
    Replace(String),
    /// Current content already satisfies the request; skip the write
    Unchanged,
}

/// Result of a completed write operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    /// Version after the operation; `None` when nothing was written to a missing file
    pub version: Option<VersionToken>,
    /// Attempts consumed, including the successful one
    pub attempts: u32,
    /// Whether a write was committed
    pub committed: bool,
}

/// Performs optimistic read-mutate-write cycles with bounded retries
#[derive(Clone)]
pub struct RetryingWriter {
    store: Arc<dyn RemoteFileStore>,
    policy: RetryPolicy,
}

impl RetryingWriter {
    pub fn new(store: Arc<dyn RemoteFileStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<dyn RemoteFileStore> {
        &self.store
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Read `path` once, treating a missing file as empty
    pub async fn read(&self, path: &str) -> Result<FileSnapshot, ApiError> {
        match self.bounded(self.store.read(path)).await {
            Ok(snapshot) => Ok(snapshot),
            Err(err) if err.is_retryable() => Err(ApiError::StoreUnavailable {
                path: path.to_string(),
                attempts: 1,
                last_error: err.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Apply `mutate` to the current content of `path` and write it back
    ///
    /// `mutate` runs once per attempt against freshly read content and must
    /// not have side effects outside its return value. Errors it returns end
    /// the operation immediately. Version conflicts and transient store
    /// failures are retried up to the policy's attempt limit.
    pub async fn run_with_retry<F>(
        &self,
        path: &str,
        message: &str,
        mutate: F,
    ) -> Result<WriteReceipt, ApiError>
    where
        F: Fn(&str) -> Result<Mutation, ApiError>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error: Option<StoreError> = None;

        for attempt in 1..=max_attempts {
            match self.attempt(path, message, &mutate).await? {
                Ok(receipt) => {
                    let receipt = WriteReceipt {
                        attempts: attempt,
                        ..receipt
                    };
                    if receipt.committed {
                        info!(
                            path = %path,
                            backend = self.store.backend_tag(),
                            attempts = attempt,
                            "Write committed"
                        );
                    } else {
                        debug!(path = %path, attempts = attempt, "No change; write skipped");
                    }
                    return Ok(receipt);
                }
                Err(err) => {
                    warn!(
                        path = %path,
                        attempt,
                        max_attempts,
                        error = %err,
                        "Retryable store failure"
                    );
                    last_error = Some(err);
                    if attempt < max_attempts {
                        sleep(self.policy.backoff_for(attempt)).await;
                    }
                }
            }
        }

        let last_error =
            last_error.unwrap_or_else(|| StoreError::Transient("no attempts made".into()));
        let path = path.to_string();
        Err(match last_error {
            StoreError::VersionConflict { .. } => ApiError::WriteExhausted {
                path,
                attempts: max_attempts,
                last_error: last_error.to_string(),
            },
            _ => ApiError::StoreUnavailable {
                path,
                attempts: max_attempts,
                last_error: last_error.to_string(),
            },
        })
    }

    /// One read-mutate-write cycle
    ///
    /// Outer `Err` is terminal; inner `Err` is a retryable store failure.
    async fn attempt<F>(
        &self,
        path: &str,
        message: &str,
        mutate: &F,
    ) -> Result<Result<WriteReceipt, StoreError>, ApiError>
    where
        F: Fn(&str) -> Result<Mutation, ApiError>,
    {
        let snapshot = match self.bounded(self.store.read(path)).await {
            Ok(snapshot) => snapshot,
            Err(err) if err.is_retryable() => return Ok(Err(err)),
            Err(err) => return Err(err.into()),
        };

        let content = match mutate(&snapshot.content)? {
            Mutation::Unchanged => {
                return Ok(Ok(WriteReceipt {
                    version: snapshot.version,
                    attempts: 0,
                    committed: false,
                }))
            }
            Mutation::Replace(content) => content,
        };

        match self
            .bounded(
                self.store
                    .write(path, &content, snapshot.version.as_ref(), message),
            )
            .await
        {
            Ok(version) => Ok(Ok(WriteReceipt {
                version: Some(version),
                attempts: 0,
                committed: true,
            })),
            Err(err) if err.is_retryable() => Ok(Err(err)),
            Err(err) => Err(err.into()),
        }
    }

    /// Run a store call under the per-operation deadline
    async fn bounded<T, Fut>(&self, fut: Fut) -> Result<T, StoreError>
    where
        Fut: Future<Output = Result<T, StoreError>>,
    {
        match timeout(self.policy.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Transient(format!(
                "store call exceeded {}ms",
                self.policy.op_timeout.as_millis()
            ))),
        }
    }
}
