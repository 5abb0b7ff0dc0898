use super::*;
use crate::base::{CallOutcome, GateError, GateResult};
use crate::executor::{global_executor, BoundedExecutor};
use crate::{logging, Result};
use std::marker::PhantomData;
use std::sync::Arc;

/// The propagating circuit breaker. One instance guards one logical remote
/// dependency; every attempted remote operation goes through
/// [`CircuitBreaker::protected_run`].
///
/// One external call performs at most one underlying attempt; the breaker
/// never retries internally. All failure kinds are propagated to the caller
/// as [`GateError`] values.
#[derive(Debug)]
pub struct CircuitBreaker<T> {
    machine: BreakerMachine,
    executor: Arc<BoundedExecutor>,
    _result: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> CircuitBreaker<T> {
    /// Creates a breaker over the process-wide executor.
    pub fn new(config: BreakerConfig) -> Result<Self> {
        Self::with_executor(config, global_executor())
    }

    /// Creates a breaker over a dedicated executor pool.
    pub fn with_executor(config: BreakerConfig, executor: Arc<BoundedExecutor>) -> Result<Self> {
        config.is_valid()?;
        Ok(CircuitBreaker {
            machine: BreakerMachine::new(Arc::new(config)),
            executor,
            _result: PhantomData,
        })
    }

    /// `protected_run` executes one attempt of the guarded call, bounded by
    /// the configured call timeout, and drives the state machine with its
    /// outcome. While the breaker is Open before the recovery deadline no
    /// attempt is made and `GateError::Open` is returned immediately.
    pub fn protected_run<F>(&self, supplier: F) -> GateResult<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        self.machine.try_acquire()?;
        let outcome = self.attempt(supplier);
        self.machine.on_attempt_complete(outcome.is_success());
        match outcome {
            CallOutcome::Success(value) => Ok(value),
            CallOutcome::Failure(err) => Err(GateError::Underlying(err)),
            CallOutcome::Timeout => Err(GateError::Timeout {
                timeout_ms: self.bound_config().call_timeout_ms,
            }),
        }
    }

    /// Dispatches the supplier to the executor and waits out the timeout.
    /// Holding no machine lock here keeps concurrent callers independent.
    fn attempt<F>(&self, supplier: F) -> CallOutcome<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        match self.executor.submit(supplier) {
            Ok(handle) => handle.wait_for(self.bound_config().call_timeout()),
            // A rejected submission counts as a failed attempt against the
            // dependency's streak.
            Err(err) => {
                logging::FREQUENT_ERROR_ONCE.call_once(|| {
                    logging::error!(
                        "[CircuitBreaker] executor rejected the task in protected_run(), dependency {}",
                        self.bound_config().dependency
                    );
                });
                CallOutcome::Failure(err)
            }
        }
    }
}

impl<T: Send + 'static> CircuitBreakerTrait for CircuitBreaker<T> {
    fn machine(&self) -> &BreakerMachine {
        &self.machine
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils;
    use crate::Error;
    use rand::Rng;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn breaker(max_failures: u32, timeout_ms: u64, recovery_ms: u64) -> CircuitBreaker<String> {
        CircuitBreaker::new(BreakerConfig {
            dependency: "lms_quiz_list".into(),
            max_consecutive_failures: max_failures,
            call_timeout_ms: timeout_ms,
            recovery_period_ms: recovery_ms,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn invalid_config_rejected() {
        let result: Result<CircuitBreaker<String>> = CircuitBreaker::new(BreakerConfig {
            dependency: "".into(),
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn success_passes_value_through() {
        let breaker = breaker(3, 500, 1000);
        let result = breaker.protected_run(|| Ok("Hello".to_string()));
        assert_eq!(result.unwrap(), "Hello");
        assert_eq!(breaker.current_state(), State::Closed);
    }

    #[test]
    fn failure_propagates_and_degrades() {
        let breaker = breaker(3, 500, 1000);
        let result = breaker.protected_run(|| -> Result<String> {
            Err(Error::msg("lms returned 502"))
        });
        let err = result.unwrap_err();
        assert!(err.is_underlying());
        assert_eq!(breaker.current_state(), State::HalfOpen);
        assert_eq!(breaker.failure_streak(), 1);
    }

    #[test]
    fn timeout_is_reported_with_bound() {
        let breaker = breaker(3, 50, 1000);
        let err = breaker
            .protected_run(|| {
                utils::sleep_for_ms(300);
                Ok("late".to_string())
            })
            .unwrap_err();
        match err {
            GateError::Timeout { timeout_ms } => assert_eq!(timeout_ms, 50),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(breaker.current_state(), State::HalfOpen);
    }

    #[test]
    fn open_breaker_fast_fails_without_attempt() {
        static ATTEMPTS: AtomicU32 = AtomicU32::new(0);
        let breaker = breaker(1, 500, 60_000);
        for _ in 0..2 {
            let _ = breaker.protected_run(|| -> Result<String> {
                ATTEMPTS.fetch_add(1, Ordering::SeqCst);
                Err(Error::msg("down"))
            });
        }
        assert_eq!(breaker.current_state(), State::Open);
        for _ in 0..10 {
            let err = breaker
                .protected_run(|| -> Result<String> {
                    ATTEMPTS.fetch_add(1, Ordering::SeqCst);
                    Err(Error::msg("down"))
                })
                .unwrap_err();
            assert!(err.is_open());
        }
        // only the two initial attempts ever reached the supplier
        assert_eq!(ATTEMPTS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn recovers_through_probe() {
        let breaker = breaker(1, 500, 50);
        let _ = breaker.protected_run(|| -> Result<String> { Err(Error::msg("down")) });
        let _ = breaker.protected_run(|| -> Result<String> { Err(Error::msg("down")) });
        assert_eq!(breaker.current_state(), State::Open);
        utils::sleep_for_ms(80);
        let result = breaker.protected_run(|| Ok("back".to_string()));
        assert_eq!(result.unwrap(), "back");
        assert_eq!(breaker.current_state(), State::Closed);
        assert_eq!(breaker.failure_streak(), 0);
    }

    #[test]
    fn flaky_supplier_never_panics_the_gate() {
        let breaker = breaker(3, 100, 20);
        for _ in 0..50 {
            let roll = rand::thread_rng().gen_range(0..3);
            let result = breaker.protected_run(move || -> Result<String> {
                match roll {
                    0 => Ok("ok".to_string()),
                    1 => Err(Error::msg("flaky")),
                    _ => panic!("flaky panic"),
                }
            });
            if let Err(err) = result {
                assert!(err.is_open() || err.is_underlying() || err.is_timeout());
            }
            utils::sleep_for_ms(1);
        }
    }
}
