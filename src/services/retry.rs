//! Bounded retry of transient failures
//!
//! Retrying is an explicit state machine: `RetryState` counts attempts and
//! decides after each failure, and `run_with_retry` drives it with sleeps
//! taken from a [`Scheduler`] so virtual time can be fast-forwarded.

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::state::Scheduler;
use crate::utils::errors::ApiError;
use crate::utils::logging;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_retries + 1,
            delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.delay())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then make attempt number `attempt`
    Retry { attempt: u32, delay: Duration },
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempt: u32,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Attempts started so far
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    pub fn on_failure(&self, error: &ApiError) -> RetryDecision {
        if !error.is_transient() || self.attempt >= self.policy.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry {
            attempt: self.attempt + 1,
            delay: self.policy.delay,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    Succeeded(T),
    /// Attempts exhausted, or a failure that is not worth retrying
    Failed { error: ApiError, attempts: u32 },
    /// The caller stopped wanting the result between attempts
    Abandoned { attempts: u32 },
}

/// Run `call` until it succeeds, fails permanently, or the attempt budget is
/// spent. `still_wanted` is consulted before every retry.
pub async fn run_with_retry<T, F, Fut, W>(
    policy: RetryPolicy,
    scheduler: &dyn Scheduler,
    operation: &str,
    still_wanted: W,
    mut call: F,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
    W: Fn() -> bool,
{
    let mut state = RetryState::new(policy);

    loop {
        state.begin_attempt();
        let error = match call().await {
            Ok(value) => return RetryOutcome::Succeeded(value),
            Err(error) => error,
        };

        match state.on_failure(&error) {
            RetryDecision::GiveUp => {
                logging::log_api_error(operation, &error.to_string(), Some("giving up"));
                return RetryOutcome::Failed {
                    error,
                    attempts: state.attempt(),
                };
            }
            RetryDecision::Retry { attempt, delay } => {
                logging::log_retry(operation, attempt, policy.max_attempts, &error.to_string());
                scheduler.sleep(delay).await;
                if !still_wanted() {
                    return RetryOutcome::Abandoned {
                        attempts: state.attempt(),
                    };
                }
            }
        }
    }
}
