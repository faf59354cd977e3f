use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, info};

use super::backoff::{Backoff, jittered_step};
use super::classify::{DEFAULT_SUCCESS_STATUS_CODES, StatusClass, classify};
use super::driver::{Attempt, RetryLoop};
use super::policy::RetryPolicy;
use crate::context::Context;
use crate::diagnostics::Diagnostics;
use crate::error::RetryError;

/// What a single invocation of an [`Operation`] observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationResult {
    pub body: Vec<u8>,
    pub diagnostics: Diagnostics,
    pub status: u16,
}

impl OperationResult {
    pub fn new(body: impl Into<Vec<u8>>, diagnostics: Diagnostics, status: u16) -> Self {
        Self {
            body: body.into(),
            diagnostics,
            status,
        }
    }

    /// A bodiless, diagnostics-free result carrying only a status code.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }
}

/// A single side-effecting HTTP call, invoked once per attempt.
///
/// Any `FnMut() -> impl Future<Output = OperationResult>` is an operation.
pub trait Operation {
    fn execute(&mut self) -> impl Future<Output = OperationResult>;
}

impl<F, Fut> Operation for F
where
    F: FnMut() -> Fut,
    Fut: Future<Output = OperationResult>,
{
    fn execute(&mut self) -> impl Future<Output = OperationResult> {
        self()
    }
}

/// The two states of a retry sequence. Failure is an `Err`, not a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Retrying,
    Success,
}

impl fmt::Display for RetryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryState::Retrying => write!(f, "retrying"),
            RetryState::Success => write!(f, "success"),
        }
    }
}

/// Outcome of one [`RetryConfig::refresh`]. `body` is only set on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refresh {
    pub state: RetryState,
    pub body: Option<Vec<u8>>,
}

impl Refresh {
    fn retrying() -> Self {
        Self {
            state: RetryState::Retrying,
            body: None,
        }
    }

    fn success(body: Vec<u8>) -> Self {
        Self {
            state: RetryState::Success,
            body: Some(body),
        }
    }
}

/// A retry sequence around one [`Operation`], fixed for its whole lifetime.
pub struct RetryConfig<O> {
    operation_name: String,
    operation: O,
    success_codes: Vec<u16>,
    timeout: Duration,
    backoff: Backoff,
}

impl<O> fmt::Debug for RetryConfig<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("operation_name", &self.operation_name)
            .field("success_codes", &self.success_codes)
            .field("timeout", &self.timeout)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl<O: Operation> RetryConfig<O> {
    /// Build a retry sequence.
    ///
    /// An empty `success_codes` falls back to 202/204, and zero delays fall
    /// back to the policy's. Budgets longer than the policy's jitter
    /// threshold get a randomized step floor.
    pub fn new(
        operation_name: impl Into<String>,
        operation: O,
        success_codes: &[u16],
        timeout: Duration,
        initial_delay: Duration,
        retry_interval: Duration,
        policy: &RetryPolicy,
    ) -> Result<Self, RetryError> {
        let operation_name = operation_name.into();
        if timeout.is_zero() {
            return Err(RetryError::InvalidConfig(format!(
                "retry timeout for {operation_name} must be greater than zero"
            )));
        }
        policy.validate()?;

        let success_codes = if success_codes.is_empty() {
            DEFAULT_SUCCESS_STATUS_CODES.to_vec()
        } else {
            success_codes.to_vec()
        };
        let initial_delay = if initial_delay.is_zero() {
            policy.initial_delay
        } else {
            initial_delay
        };
        let retry_interval = if retry_interval.is_zero() {
            policy.retry_interval
        } else {
            retry_interval
        };
        let min_step = jittered_step(retry_interval, timeout, policy, &mut rand::thread_rng());

        Ok(Self {
            operation_name,
            operation,
            success_codes,
            timeout,
            backoff: Backoff::new(initial_delay, min_step, policy.max_interval.max(min_step)),
        })
    }

    /// Build a retry sequence whose budget and delays all come from `policy`,
    /// with the budget derived from the caller's context deadline.
    pub fn from_policy(
        ctx: &Context,
        operation_name: impl Into<String>,
        operation: O,
        success_codes: &[u16],
        policy: &RetryPolicy,
    ) -> Result<Self, RetryError> {
        policy.validate()?;
        Self::new(
            operation_name,
            operation,
            success_codes,
            policy.timeout_for_context(ctx),
            policy.initial_delay,
            policy.retry_interval,
            policy,
        )
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    pub fn success_codes(&self) -> &[u16] {
        &self.success_codes
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Invoke the operation exactly once and classify what came back.
    pub async fn refresh(&mut self) -> Result<Refresh, RetryError> {
        let OperationResult {
            body,
            diagnostics,
            status,
        } = self.operation.execute().await;
        let class = classify(status, &self.success_codes);
        debug!(operation = %self.operation_name, status, ?class, "operation attempt classified");

        match class {
            StatusClass::Retryable => Ok(Refresh::retrying()),
            StatusClass::Success if diagnostics.has_error() => Err(RetryError::DiagnosticsOnSuccess {
                operation: self.operation_name.clone(),
                diagnostics,
            }),
            StatusClass::Success => Ok(Refresh::success(body)),
            StatusClass::Fatal => Err(RetryError::NonRetryableStatus {
                status,
                operation: self.operation_name.clone(),
            }),
        }
    }

    /// Drive [`refresh`](Self::refresh) until success, a fatal
    /// classification, the time budget, or the context gives out.
    pub async fn wait_for_completion(&mut self, ctx: &Context) -> Result<Vec<u8>, RetryError> {
        let retry_loop = RetryLoop::new(ctx, self.operation_name.clone(), self.timeout, self.backoff);
        let body = retry_loop.run(&mut UntilSuccess(&mut *self)).await?;
        info!(operation = %self.operation_name, "operation succeeded");
        Ok(body)
    }
}

struct UntilSuccess<'a, O>(&'a mut RetryConfig<O>);

impl<O: Operation> Attempt for UntilSuccess<'_, O> {
    type Output = Vec<u8>;

    async fn attempt(&mut self) -> Result<Vec<u8>, RetryError> {
        let refreshed = self.0.refresh().await?;
        match (refreshed.state, refreshed.body) {
            (RetryState::Success, Some(body)) => Ok(body),
            _ => Err(RetryError::StillRetrying {
                operation: self.0.operation_name.clone(),
            }),
        }
    }
}
