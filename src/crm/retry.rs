use std::fmt::Display;
use std::time::Duration;

/// Attempt limit and exponential backoff for CRM calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_secs: 2,
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt `attempt` (1-based): `base^attempt` seconds.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.backoff_base_secs.saturating_pow(attempt))
    }
}

/// Run `op` until it succeeds or the policy's attempts are exhausted.
///
/// `op` receives the 1-based attempt number. `sleep` is called between
/// attempts (never after the last). The last error is returned on exhaustion.
pub fn with_retry<T, E, F, S>(policy: &RetryPolicy, label: &str, sleep: S, mut op: F) -> Result<T, E>
where
    E: Display,
    F: FnMut(u32) -> Result<T, E>,
    S: Fn(Duration),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    label,
                    attempt,
                    delay_secs = delay.as_secs(),
                    error = %e,
                    "Request failed, retrying"
                );
                sleep(delay);
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(label, attempts = attempt, error = %e, "Request failed after all attempts");
                return Err(e);
            }
        }
    }
}
