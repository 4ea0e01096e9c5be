// Retry - exponential backoff with jitter and an elapsed-time budget
//
// Schedule for the wait after failed attempt n (1-based):
//   nominal = initial * multiplier^(n-1), capped by max_interval
//   full jitter draws the actual wait uniformly from [0, nominal]
// A wait never runs past the budget; once the budget is spent the last
// error comes back wrapped in `ServiceError::RetryExhausted`.

use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};

use rand::Rng;

use crate::error::ServiceError;

/// Source of time for the retry loop
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `std::thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Clock that only advances when slept on; records every wait
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Cell<Duration>,
    waits: RefCell<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Cell::new(Duration::ZERO),
            waits: RefCell::new(Vec::new()),
        }
    }

    /// Total time slept so far
    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.borrow().clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }

    fn sleep(&self, duration: Duration) {
        self.offset.set(self.offset.get() + duration);
        self.waits.borrow_mut().push(duration);
    }
}

/// Randomization applied to each nominal wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jitter {
    /// Wait exactly the nominal interval
    None,
    /// Wait uniformly in `[0, nominal]`
    Full,
}

/// Backoff schedule, budget, and the predicate deciding what is retried
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Option<Duration>,
    pub max_elapsed: Duration,
    pub jitter: Jitter,
    pub retryable: fn(&ServiceError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            multiplier: 2.0,
            max_interval: None,
            max_elapsed: Duration::from_secs(60),
            jitter: Jitter::Full,
            retryable: ServiceError::is_transient,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_initial_interval(mut self, initial: Duration) -> Self {
        self.initial_interval = initial;
        self
    }

    /// Nominal wait after the `failures`-th consecutive failure (1-based)
    pub fn nominal_wait(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_interval.as_secs_f64() * self.multiplier.powi(exponent);
        let ceiling = self.max_interval.unwrap_or(self.max_elapsed);
        if !secs.is_finite() || secs >= ceiling.as_secs_f64() {
            return ceiling;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }

    fn jittered<R: Rng + ?Sized>(&self, nominal: Duration, rng: &mut R) -> Duration {
        match self.jitter {
            Jitter::None => nominal,
            Jitter::Full => nominal.mul_f64(rng.gen::<f64>()),
        }
    }

    /// Run `operation` until it succeeds, fails permanently, or the budget runs out
    ///
    /// The closure receives the 1-based attempt number.
    pub fn run<T, R, F>(&self, clock: &dyn Clock, rng: &mut R, mut operation: F) -> Result<T, ServiceError>
    where
        R: Rng + ?Sized,
        F: FnMut(u32) -> Result<T, ServiceError>,
    {
        let start = clock.now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let err = match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !(self.retryable)(&err) {
                return Err(err);
            }

            let elapsed = clock.now().saturating_duration_since(start);
            if elapsed >= self.max_elapsed {
                tracing::warn!(
                    "[Retry] Giving up after {} attempts in {:?}: {}",
                    attempt,
                    elapsed,
                    err
                );
                return Err(ServiceError::RetryExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let remaining = self.max_elapsed - elapsed;
            let wait = self.jittered(self.nominal_wait(attempt), rng).min(remaining);
            tracing::warn!(
                "[Retry] Attempt {} failed ({}), retrying in {:?}",
                attempt,
                err,
                wait
            );
            clock.sleep(wait);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn throttled() -> ServiceError {
        ServiceError::transient("classifier", "throttled")
    }

    #[test]
    fn test_nominal_waits_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.nominal_wait(1), Duration::from_secs(1));
        assert_eq!(policy.nominal_wait(2), Duration::from_secs(2));
        assert_eq!(policy.nominal_wait(5), Duration::from_secs(16));
    }

    #[test]
    fn test_nominal_wait_saturates_at_budget() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.nominal_wait(7), Duration::from_secs(60));
        assert_eq!(policy.nominal_wait(u32::MAX), Duration::from_secs(60));

        let capped = RetryPolicy {
            max_interval: Some(Duration::from_secs(5)),
            ..RetryPolicy::default()
        };
        assert_eq!(capped.nominal_wait(4), Duration::from_secs(5));
    }

    #[test]
    fn test_full_jitter_stays_below_nominal() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(3);
        for failures in 1..6 {
            let nominal = policy.nominal_wait(failures);
            let wait = policy.jittered(nominal, &mut rng);
            assert!(wait <= nominal);
        }
    }

    #[test]
    fn test_success_after_transient_failures() {
        let policy = RetryPolicy::default().with_jitter(Jitter::None);
        let clock = ManualClock::new();
        let mut rng = StdRng::seed_from_u64(1);

        let result = policy.run(&clock, &mut rng, |attempt| {
            if attempt <= 3 {
                Err(throttled())
            } else {
                Ok(attempt)
            }
        });

        assert_eq!(result, Ok(4));
        assert_eq!(
            clock.waits(),
            vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[test]
    fn test_budget_exhaustion_wraps_last_error() {
        let policy = RetryPolicy::default().with_jitter(Jitter::None);
        let clock = ManualClock::new();
        let mut rng = StdRng::seed_from_u64(1);

        let result: Result<(), _> = policy.run(&clock, &mut rng, |_| Err(throttled()));

        // 1 + 2 + 4 + 8 + 16 = 31 s, then the last wait is trimmed to 29 s
        assert_eq!(clock.waits().last(), Some(&Duration::from_secs(29)));
        assert_eq!(clock.elapsed(), Duration::from_secs(60));
        match result {
            Err(ServiceError::RetryExhausted { attempts, last }) => {
                assert_eq!(attempts, 7);
                assert_eq!(*last, throttled());
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[test]
    fn test_fatal_error_is_not_retried() {
        let policy = RetryPolicy::default();
        let clock = ManualClock::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut calls = 0;

        let result: Result<(), _> = policy.run(&clock, &mut rng, |_| {
            calls += 1;
            Err(ServiceError::fatal("classifier", "unknown model"))
        });

        assert_eq!(calls, 1);
        assert!(matches!(result, Err(ServiceError::Fatal { .. })));
        assert!(clock.waits().is_empty());
    }

    #[test]
    fn test_jittered_run_respects_budget() {
        let policy = RetryPolicy::default().with_max_elapsed(Duration::from_secs(10));
        let clock = ManualClock::new();
        let mut rng = StdRng::seed_from_u64(99);

        let result: Result<(), _> = policy.run(&clock, &mut rng, |_| Err(throttled()));

        assert!(matches!(result, Err(ServiceError::RetryExhausted { .. })));
        assert!(clock.elapsed() <= Duration::from_secs(10));
    }
}
