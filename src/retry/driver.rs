use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use super::backoff::Backoff;
use crate::context::Context;
use crate::error::RetryError;

/// One unit of work the driving loop invokes repeatedly.
///
/// Returning a retryable [`RetryError`] asks for another attempt; any other
/// error stops the loop at once. Implemented for every
/// `FnMut() -> impl Future<Output = Result<T, RetryError>>`, and by
/// stateful attempts such as [`JobPoller`](crate::job::JobPoller) that need
/// to remember what they observed between calls.
pub trait Attempt {
    type Output;

    fn attempt(&mut self) -> impl Future<Output = Result<Self::Output, RetryError>>;
}

impl<F, Fut, T> Attempt for F
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError>>,
{
    type Output = T;

    fn attempt(&mut self) -> impl Future<Output = Result<T, RetryError>> {
        self()
    }
}

/// Drives an [`Attempt`] until it succeeds, fails fatally, runs out of
/// budget, or the context stops.
///
/// Attempts never overlap: attempt N+1 starts only after attempt N has been
/// classified. The context is checked before every attempt and raced
/// against every wait; an attempt already in flight is never interrupted.
#[derive(Debug)]
pub struct RetryLoop<'a> {
    ctx: &'a Context,
    operation: String,
    budget: Duration,
    backoff: Backoff,
}

impl<'a> RetryLoop<'a> {
    pub fn new(
        ctx: &'a Context,
        operation: impl Into<String>,
        budget: Duration,
        backoff: Backoff,
    ) -> Self {
        Self {
            ctx,
            operation: operation.into(),
            budget,
            backoff,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub async fn run<A: Attempt>(&self, attempt: &mut A) -> Result<A::Output, RetryError> {
        // A budget too large to represent as an instant never expires.
        let deadline = Instant::now().checked_add(self.budget);
        let mut retries: u32 = 0;

        loop {
            if let Some(reason) = self.ctx.err() {
                warn!(operation = %self.operation, ?reason, "context no longer active, giving up");
                return Err(reason.into_retry_error(&self.operation));
            }

            let last_error = match attempt.attempt().await {
                Ok(output) => {
                    debug!(operation = %self.operation, attempts = retries + 1, "attempt succeeded");
                    return Ok(output);
                }
                Err(err) if err.is_retryable() => err,
                Err(err) => {
                    debug!(operation = %self.operation, error = %err, "attempt failed fatally");
                    return Err(err);
                }
            };

            retries += 1;
            let mut wait = self.backoff.delay_for_retry(retries);
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Err(self.timeout(last_error));
                }
                wait = wait.min(deadline - now);
            }
            debug!(
                operation = %self.operation,
                retry = retries,
                ?wait,
                error = %last_error,
                "scheduling retry"
            );

            tokio::select! {
                biased;
                reason = self.ctx.done() => {
                    warn!(operation = %self.operation, ?reason, "interrupted while waiting to retry");
                    return Err(reason.into_retry_error(&self.operation));
                }
                _ = sleep(wait) => {}
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(self.timeout(last_error));
            }
        }
    }

    fn timeout(&self, last_error: RetryError) -> RetryError {
        warn!(operation = %self.operation, budget = ?self.budget, "retry budget exhausted");
        RetryError::Timeout {
            operation: self.operation.clone(),
            timeout: self.budget,
            last_error: Some(Box::new(last_error)),
        }
    }
}

/// Repeatedly call `attempt` until it returns `Ok`, a non-retryable error,
/// or `timeout`/the context expires, sleeping between calls on the
/// [`Backoff::polling`] schedule.
pub async fn retry_context<A: Attempt>(
    ctx: &Context,
    timeout: Duration,
    attempt: &mut A,
) -> Result<A::Output, RetryError> {
    RetryLoop::new(ctx, "retryable operation", timeout, Backoff::polling())
        .run(attempt)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn not_final() -> RetryError {
        RetryError::NotFinal {
            subject: "AAP job".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_first_success_without_waiting() {
        let ctx = Context::background();
        let started = Instant::now();
        let result = retry_context(&ctx, Duration::from_secs(5), &mut || async { Ok::<_, RetryError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(Instant::now(), started);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let ctx = Context::background();
        let calls = Cell::new(0);
        let result = retry_context(&ctx, Duration::from_secs(30), &mut || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { if n < 3 { Err(not_final()) } else { Ok(n) } }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_short_circuits() {
        let ctx = Context::background();
        let calls = Cell::new(0);
        let started = Instant::now();
        let result: Result<(), _> = retry_context(&ctx, Duration::from_secs(30), &mut || {
            calls.set(calls.get() + 1);
            async { Err(RetryError::Parse("unexpected token".into())) }
        })
        .await;
        assert!(matches!(result, Err(RetryError::Parse(_))));
        assert_eq!(calls.get(), 1);
        assert_eq!(Instant::now(), started);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_carries_last_retryable_error() {
        let ctx = Context::background();
        let calls = Cell::new(0);
        let started = Instant::now();
        let result: Result<(), _> = retry_context(&ctx, Duration::from_secs(5), &mut || {
            calls.set(calls.get() + 1);
            async { Err(not_final()) }
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("hasn't yet reached a final state"));
        assert!(calls.get() >= 2);
        assert_eq!(Instant::now() - started, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_context_stops_before_first_attempt() {
        let ctx = Context::background();
        ctx.cancel();
        let calls = Cell::new(0);
        let result: Result<(), _> = retry_context(&ctx, Duration::from_secs(5), &mut || {
            calls.set(calls.get() + 1);
            async { Ok(()) }
        })
        .await;
        assert!(matches!(result, Err(RetryError::Cancelled { .. })));
        assert_eq!(calls.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn context_deadline_interrupts_wait() {
        let ctx = Context::background().with_timeout(Duration::from_secs(2));
        let started = Instant::now();
        let backoff = Backoff::new(
            Duration::from_secs(10),
            Duration::from_secs(10),
            Duration::from_secs(10),
        );
        let result: Result<(), _> = RetryLoop::new(&ctx, "delete host", Duration::from_secs(60), backoff)
            .run(&mut || async { Err(not_final()) })
            .await;
        assert!(matches!(result, Err(RetryError::DeadlineExceeded { .. })));
        assert_eq!(Instant::now() - started, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_wait_returns_promptly() {
        let ctx = Context::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });
        let started = Instant::now();
        let result: Result<(), _> = retry_context(&ctx, Duration::from_secs(600), &mut || async { Err(not_final()) }).await;
        assert!(matches!(result, Err(RetryError::Cancelled { .. })));
        assert!(Instant::now() - started < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_follow_backoff_schedule() {
        let ctx = Context::background();
        let backoff = Backoff::new(
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(10),
        );
        let seen = std::cell::RefCell::new(Vec::new());
        let started = Instant::now();
        let result = RetryLoop::new(&ctx, "op", Duration::from_secs(60), backoff)
            .run(&mut || {
                seen.borrow_mut().push(Instant::now() - started);
                let n = seen.borrow().len();
                async move { if n < 4 { Err(not_final()) } else { Ok(()) } }
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(
            *seen.borrow(),
            vec![
                Duration::ZERO,
                Duration::from_secs(1),
                Duration::from_secs(3),
                Duration::from_secs(7),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_budget_does_not_overflow() {
        let ctx = Context::background();
        let fatal: Result<(), _> = retry_context(&ctx, Duration::from_secs(u64::MAX), &mut || async {
            Err(RetryError::Parse("unexpected token".into()))
        })
        .await;
        assert!(matches!(fatal, Err(RetryError::Parse(_))));

        let calls = Cell::new(0);
        let eventually = retry_context(&ctx, Duration::MAX, &mut || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { if n < 3 { Err(not_final()) } else { Ok(n) } }
        })
        .await;
        assert_eq!(eventually.unwrap(), 3);
    }
}
