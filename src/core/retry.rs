use std::future::Future;
use std::time::Duration;

/// Result of a single attempt, as judged by the caller's classifier.
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    /// Definitive negative answer, stop without an error.
    Terminal,
    /// Quota or rate limit; wait `base_delay * attempt` and try again.
    Throttled(String),
    /// Transient failure; back off exponentially and try again.
    Retry(String),
    /// Failure that will not improve on retry.
    Abort(String),
}

#[derive(Debug, PartialEq)]
pub enum RetryOutcome<T> {
    Success { value: T, attempts: u32 },
    NotFound { attempts: u32 },
    Exhausted { attempts: u32, last_error: String },
    Aborted { attempts: u32, error: String },
}

impl<T> RetryOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Success { attempts, .. }
            | RetryOutcome::NotFound { attempts }
            | RetryOutcome::Exhausted { attempts, .. }
            | RetryOutcome::Aborted { attempts, .. } => *attempts,
        }
    }
}

/// 重試策略：最大次數、指數退避、每次嘗試的逾時遞增
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: u32,
    pub base_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            backoff_factor: 2,
            base_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Later attempts get more time: `base_timeout * attempt`.
    pub fn timeout_for(&self, attempt: u32) -> Duration {
        self.base_timeout * attempt.max(1)
    }

    /// `base_delay * factor^(attempt-1)`
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        self.base_delay * self.backoff_factor.saturating_pow(exponent)
    }

    pub fn throttle_delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt.max(1)
    }

    /// Runs `op` until it succeeds, gives a terminal verdict, or the attempt
    /// budget is spent. `op` receives the 1-based attempt number and the
    /// timeout to apply to that attempt.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut(u32, Duration) -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=max_attempts {
            match op(attempt, self.timeout_for(attempt)).await {
                Attempt::Done(value) => {
                    return RetryOutcome::Success {
                        value,
                        attempts: attempt,
                    }
                }
                Attempt::Terminal => return RetryOutcome::NotFound { attempts: attempt },
                Attempt::Abort(error) => {
                    return RetryOutcome::Aborted {
                        attempts: attempt,
                        error,
                    }
                }
                Attempt::Throttled(reason) => {
                    let delay = self.throttle_delay_for(attempt);
                    tracing::warn!(
                        "⏳ Attempt {}/{} throttled ({}), waiting {:?}",
                        attempt,
                        max_attempts,
                        reason,
                        delay
                    );
                    last_error = reason;
                    tokio::time::sleep(delay).await;
                }
                Attempt::Retry(reason) => {
                    tracing::warn!("Attempt {}/{} failed: {}", attempt, max_attempts, reason);
                    last_error = reason;
                    if attempt < max_attempts {
                        let delay = self.backoff_for(attempt);
                        tracing::debug!("Retrying after {:?}", delay);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        RetryOutcome::Exhausted {
            attempts: max_attempts,
            last_error,
        }
    }
}
