// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded retry with per-call timeouts for store writes
//!
//! Every money-moving call runs through [`RetryPolicy::run`]. A timeout is
//! an unknown outcome, not a failure: the call is reissued under the same
//! idempotency reference, and the store's reference dedupe turns a
//! duplicate apply into a replay of the recorded receipt. Version
//! conflicts are retried because the closures re-read state on every
//! attempt; business errors are terminal immediately.

use adv_core::RetryConfig;
use adv_storage::StoreError;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// A saga step that could not be completed
#[derive(Debug, Error)]
#[error("{step} gave up after {attempts} attempts: {source}")]
pub struct StepError {
    pub step: &'static str,
    pub attempts: u32,
    #[source]
    pub source: StoreError,
}

/// Retry policy applied to each saga step
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    op_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay,
            max_delay: config.max_delay,
            op_timeout: config.op_timeout,
        }
    }

    /// Exponential backoff for the attempt that just failed, capped
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.max_delay)
    }

    fn retryable(error: &StoreError) -> bool {
        error.is_transient() || matches!(error, StoreError::Conflict { .. })
    }

    /// Drive one step until it succeeds, hits a terminal error, or runs
    /// out of attempts.
    ///
    /// `op` must build a fresh future per call and carry the same
    /// idempotency reference across calls.
    pub async fn run<T, F, Fut>(&self, step: &'static str, mut op: F) -> Result<T, StepError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(self.op_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Unavailable(format!(
                    "no response within {:?}",
                    self.op_timeout
                ))),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(error) if Self::retryable(&error) && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        step,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "step failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(source) => {
                    return Err(StepError {
                        step,
                        attempts: attempt,
                        source,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
