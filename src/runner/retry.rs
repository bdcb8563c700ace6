use crate::config::RetryConfig;
use crate::error::ClientError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Per-entity attempt counter. Reset for every entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttempt {
    pub attempts: u32,
    pub max_attempts: u32,
}

impl RetryAttempt {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
        }
    }
}

/// Decides whether a failed remote call is tried again, and after how long.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.backoff_ms))
    }

    pub fn attempt(&self) -> RetryAttempt {
        RetryAttempt::new(self.max_attempts)
    }

    pub fn should_retry(&self, attempt: &RetryAttempt, error: &ClientError) -> bool {
        error.is_transient() && attempt.attempts < attempt.max_attempts
    }

    /// Fixed delay; the inter-entity rate limit dominates anyway.
    pub fn backoff_delay(&self, _attempt: &RetryAttempt) -> Duration {
        self.backoff
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryFailure {
    /// Transient errors on every allowed attempt
    Exhausted { attempts: u32, error: ClientError },
    /// Error classified as not worth retrying
    Fatal(ClientError),
    /// Cancellation arrived while waiting to retry
    Cancelled,
}

impl RetryFailure {
    pub fn error(&self) -> Option<&ClientError> {
        match self {
            RetryFailure::Exhausted { error, .. } | RetryFailure::Fatal(error) => Some(error),
            RetryFailure::Cancelled => None,
        }
    }
}

/// Run `operation` under `policy`, calling `on_retry` before each backoff.
///
/// A call already in flight always finishes; cancellation is only observed
/// during the backoff sleep.
pub async fn retry_with_policy<F, Fut, T, R>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut on_retry: R,
    mut operation: F,
) -> Result<T, RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
    R: FnMut(&RetryAttempt, &ClientError),
{
    let mut attempt = policy.attempt();

    loop {
        attempt.attempts += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if policy.should_retry(&attempt, &e) => {
                let delay = policy.backoff_delay(&attempt);
                warn!(
                    attempt = attempt.attempts,
                    "Attempt failed: {}. Retrying in {:?}...", e, delay
                );
                on_retry(&attempt, &e);

                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(RetryFailure::Cancelled),
                }
            }
            Err(e) if e.is_transient() => {
                warn!("All {} attempts failed: {}", attempt.attempts, e);
                return Err(RetryFailure::Exhausted {
                    attempts: attempt.attempts,
                    error: e,
                });
            }
            Err(e) => return Err(RetryFailure::Fatal(e)),
        }
    }
}
