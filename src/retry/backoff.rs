use std::time::Duration;

use rand::Rng;

use super::policy::RetryPolicy;

/// Wait schedule between attempts of one retry sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Wait before the first retry.
    pub initial_delay: Duration,
    /// Floor of every later wait.
    pub min_step: Duration,
    /// Ceiling of the exponential growth.
    pub max_step: Duration,
}

impl Backoff {
    pub fn new(initial_delay: Duration, min_step: Duration, max_step: Duration) -> Self {
        Self {
            initial_delay,
            min_step,
            max_step,
        }
    }

    /// Schedule used by the generic driver: no initial delay, 500ms floor.
    pub fn polling() -> Self {
        Self::new(
            Duration::ZERO,
            Duration::from_millis(500),
            Duration::from_secs(10),
        )
    }

    /// Wait before retry number `retry` (1-based).
    ///
    /// retry 1 waits `initial_delay`; retry n waits `min_step * 2^(n-2)`,
    /// capped at `max_step` but never below `min_step`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry <= 1 {
            return self.initial_delay;
        }
        let factor = 2u32.saturating_pow(retry - 2);
        let step = self.min_step.saturating_mul(factor);
        step.min(self.max_step).max(self.min_step)
    }
}

/// Step floor for a sequence with the given `budget`.
///
/// Long sequences get between 0 and `max_jitter - 1` whole seconds added so
/// many concurrent operations against the same API drift apart. Budgets at or
/// below the threshold keep `base` unchanged.
pub fn jittered_step<R: Rng + ?Sized>(
    base: Duration,
    budget: Duration,
    policy: &RetryPolicy,
    rng: &mut R,
) -> Duration {
    let max_jitter = policy.max_jitter.as_secs();
    if budget <= policy.jitter_threshold || max_jitter == 0 {
        return base;
    }
    base + Duration::from_secs(rng.gen_range(0..max_jitter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn first_retry_uses_initial_delay() {
        let backoff = Backoff::new(
            Duration::from_secs(2),
            Duration::from_secs(5),
            Duration::from_secs(10),
        );
        assert_eq!(backoff.delay_for_retry(0), Duration::from_secs(2));
        assert_eq!(backoff.delay_for_retry(1), Duration::from_secs(2));
    }

    #[test]
    fn later_retries_grow_exponentially_until_capped() {
        let backoff = Backoff::new(
            Duration::from_millis(100),
            Duration::from_secs(1),
            Duration::from_secs(10),
        );
        assert_eq!(backoff.delay_for_retry(2), Duration::from_secs(1));
        assert_eq!(backoff.delay_for_retry(3), Duration::from_secs(2));
        assert_eq!(backoff.delay_for_retry(4), Duration::from_secs(4));
        assert_eq!(backoff.delay_for_retry(5), Duration::from_secs(8));
        assert_eq!(backoff.delay_for_retry(6), Duration::from_secs(10));
        assert_eq!(backoff.delay_for_retry(200), Duration::from_secs(10));
    }

    #[test]
    fn cap_below_floor_keeps_floor() {
        let backoff = Backoff::new(
            Duration::ZERO,
            Duration::from_secs(7),
            Duration::from_secs(5),
        );
        assert_eq!(backoff.delay_for_retry(4), Duration::from_secs(7));
    }

    #[test]
    fn short_budgets_get_no_jitter() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        let base = Duration::from_secs(2);
        for _ in 0..50 {
            assert_eq!(
                jittered_step(base, Duration::from_secs(30), &policy, &mut rng),
                base
            );
        }
    }

    #[test]
    fn long_budgets_get_bounded_jitter() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(42);
        let base = Duration::from_secs(2);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let step = jittered_step(base, Duration::from_secs(600), &policy, &mut rng);
            assert!(step >= base && step <= base + Duration::from_secs(2), "{step:?}");
            seen.insert(step);
        }
        // 0, 1 and 2 extra seconds all show up over 200 draws.
        assert_eq!(seen.len(), 3);
    }
}
