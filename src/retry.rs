use std::future::Future;
use std::time::Duration;

use error_stack::Report;
use tokio::time::sleep;
use tracing::warn;

/// How many times to repeat a failing operation, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// A policy that runs the operation exactly once.
    pub fn once() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// A successful value together with the 1-based attempt that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

/// Run `op` until it succeeds or `policy` is exhausted.
///
/// `op` receives the 1-based attempt number. The delay is only slept
/// between attempts, never after the last one. On exhaustion the report of
/// the final attempt is returned.
pub async fn retry<T, C, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<Attempted<T>, Report<C>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Report<C>>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => {
                return Ok(Attempted {
                    value,
                    attempts: attempt,
                });
            }
            Err(report) if attempt < max_attempts => {
                warn!(
                    operation = label,
                    attempt,
                    max_attempts,
                    error = ?report,
                    "attempt failed, retrying in {:?}",
                    policy.delay
                );
                sleep(policy.delay).await;
                attempt += 1;
            }
            Err(report) => {
                warn!(
                    operation = label,
                    attempt, max_attempts, "final attempt failed"
                );
                return Err(report);
            }
        }
    }
}
