use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::context::Context;
use crate::error::RetryError;

/// Timing knobs for one family of retry sequences.
///
/// Built once and handed to every [`RetryConfig`](super::RetryConfig) and
/// [`RetryLoop`](super::RetryLoop) that needs it, so tests can vary the
/// policy freely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Smallest budget ever returned by the timeout calculation.
    pub min_timeout: Duration,
    /// Largest budget, and the budget used when nothing bounds the caller.
    pub max_timeout: Duration,
    /// Share of the caller's remaining time handed to the retry loop.
    pub safety_factor: f64,
    /// Wait before the first retry.
    pub initial_delay: Duration,
    /// Floor of every later wait.
    pub retry_interval: Duration,
    /// Ceiling of the exponential wait.
    pub max_interval: Duration,
    /// Budgets above this get a randomized step floor.
    pub jitter_threshold: Duration,
    /// Exclusive upper bound for the jitter, in whole seconds.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_timeout: Duration::from_secs(5),
            max_timeout: Duration::from_secs(30),
            safety_factor: 0.8,
            initial_delay: Duration::from_secs(2),
            retry_interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(10),
            jitter_threshold: Duration::from_secs(30),
            max_jitter: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), RetryError> {
        if self.min_timeout.is_zero() {
            return Err(RetryError::InvalidConfig(
                "minimum timeout must be greater than zero".into(),
            ));
        }
        if self.min_timeout > self.max_timeout {
            return Err(RetryError::InvalidConfig(format!(
                "minimum timeout {:?} exceeds maximum timeout {:?}",
                self.min_timeout, self.max_timeout
            )));
        }
        if !(self.safety_factor > 0.0 && self.safety_factor < 1.0) {
            return Err(RetryError::InvalidConfig(format!(
                "safety factor must be in (0, 1), got {}",
                self.safety_factor
            )));
        }
        Ok(())
    }

    /// Derive a retry budget from an ambient deadline.
    ///
    /// - no deadline: `max_timeout`
    /// - deadline already passed: `min_timeout`
    /// - otherwise `safety_factor` of the remaining time, truncated to whole
    ///   seconds and clamped to `[min_timeout, max_timeout]`
    ///
    /// Inside the clamp range the budget is strictly shorter than the time
    /// left, so the loop gives up before the caller's own deadline fires.
    pub fn calculate_timeout(&self, deadline: Option<Instant>, now: Instant) -> Duration {
        match deadline {
            None => self.max_timeout,
            Some(deadline) => self.budget_from_remaining(deadline.saturating_duration_since(now)),
        }
    }

    /// Budget for the caller's context, measured from now.
    pub fn timeout_for_context(&self, ctx: &Context) -> Duration {
        self.calculate_timeout(ctx.deadline(), Instant::now())
    }

    /// Budget for an explicit operation timeout given in seconds, as found in
    /// resource configuration. Zero or negative values mean the time is
    /// already up.
    pub fn timeout_from_secs(&self, operation_timeout_secs: i64) -> Duration {
        if operation_timeout_secs <= 0 {
            return self.min_timeout;
        }
        self.budget_from_remaining(Duration::from_secs(operation_timeout_secs as u64))
    }

    fn budget_from_remaining(&self, remaining: Duration) -> Duration {
        if remaining.is_zero() {
            return self.min_timeout;
        }
        let scaled = (remaining.as_secs_f64() * self.safety_factor).floor() as u64;
        // Must not panic when min_timeout > max_timeout.
        Duration::from_secs(scaled)
            .max(self.min_timeout)
            .min(self.max_timeout)
    }
}
