use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::remote::{RemoteError, Transience};

/// How to treat errors whose transience is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryMode {
    /// Only retry errors known to be transient.
    #[default]
    Strict,
    /// Also retry errors of unknown transience. Permanent errors are still
    /// surfaced on the first attempt.
    Permissive,
}

impl std::str::FromStr for RetryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(RetryMode::Strict),
            "permissive" => Ok(RetryMode::Permissive),
            other => Err(format!("unknown retry mode '{other}'")),
        }
    }
}

/// Retry ceiling and delay schedule for remote calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Total attempts, including the final unconditional one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub mode: RetryMode,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(16),
            mode: RetryMode::Strict,
        }
    }
}

impl BackoffPolicy {
    /// How long to wait before retrying after `err`, or `None` if the error
    /// must be surfaced right away.
    fn wait_for(&self, err: &RemoteError, delay: Duration) -> Option<Duration> {
        if let RemoteError::RateLimited {
            retry_after: Some(hint),
        } = err
        {
            if !hint.is_zero() {
                return Some(*hint);
            }
        }
        match err.transience() {
            Transience::Retryable => Some(delay),
            Transience::Unknown if self.mode == RetryMode::Permissive => Some(delay),
            Transience::Unknown | Transience::Permanent => None,
        }
    }
}

/// Terminal failure of one remote call after the backoff executor gave up.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{label} failed after {attempts} attempt(s): {source}")]
pub struct CallFailed {
    pub label: String,
    pub attempts: u32,
    #[source]
    pub source: RemoteError,
}

impl CallFailed {
    fn new(label: &str, attempts: u32, source: RemoteError) -> Self {
        Self {
            label: label.to_string(),
            attempts,
            source,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.source.is_missing()
    }
}

/// Run a remote call under `policy`.
///
/// Rate-limited calls wait for the server's hint when it is positive and for
/// the current delay otherwise. Transient failures wait for the current
/// delay, which starts at `initial_delay` and doubles up to `max_delay`.
/// Permanent failures return immediately. The last attempt is made
/// unconditionally and its error, if any, is returned.
pub async fn execute<F, Fut, T>(policy: &BackoffPolicy, label: &str, f: F) -> Result<T, CallFailed>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_delay;

    for attempt in 1..max_attempts {
        let err = match f().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };
        let Some(wait) = policy.wait_for(&err, delay) else {
            return Err(CallFailed::new(label, attempt, err));
        };
        warn!(
            "{} failed (attempt {}/{}): {}, retrying in {:?}",
            label, attempt, max_attempts, err, wait
        );
        tokio::time::sleep(wait).await;
        delay = (delay * 2).min(policy.max_delay);
    }

    f().await.map_err(|e| {
        warn!("{} failed after {} attempts: {}", label, max_attempts, e);
        CallFailed::new(label, max_attempts, e)
    })
}
