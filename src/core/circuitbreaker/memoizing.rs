use super::*;
use crate::base::GateResult;
use crate::executor::BoundedExecutor;
use crate::{logging, Result};
use std::sync::{Arc, RwLock};

/// The memoizing circuit breaker. Exactly one supplier is bound at
/// construction and re-invoked on every [`MemoizingCircuitBreaker::get`];
/// the last successful result is kept as a cache and served whenever the
/// guarded call fails, times out, or is fast-failed by the open breaker.
///
/// This variant trades freshness for availability: callers must tolerate
/// stale reads (e.g. serving the last known set of proctoring room
/// endpoints). It composes the propagating [`CircuitBreaker`], so the state
/// machine semantics are identical.
pub struct MemoizingCircuitBreaker<T> {
    breaker: CircuitBreaker<T>,
    supplier: Arc<dyn Fn() -> Result<T> + Send + Sync>,
    /// Written only on success, overwritten rather than invalidated by
    /// time; empty until the first success.
    cache: RwLock<Option<T>>,
}

impl<T> MemoizingCircuitBreaker<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a memoizing breaker over the process-wide executor, binding
    /// `supplier` for the breaker's lifetime.
    pub fn new<F>(config: BreakerConfig, supplier: F) -> Result<Self>
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        Ok(MemoizingCircuitBreaker {
            breaker: CircuitBreaker::new(config)?,
            supplier: Arc::new(supplier),
            cache: RwLock::new(None),
        })
    }

    /// Creates a memoizing breaker over a dedicated executor pool.
    pub fn with_executor<F>(
        config: BreakerConfig,
        executor: Arc<BoundedExecutor>,
        supplier: F,
    ) -> Result<Self>
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        Ok(MemoizingCircuitBreaker {
            breaker: CircuitBreaker::with_executor(config, executor)?,
            supplier: Arc::new(supplier),
            cache: RwLock::new(None),
        })
    }

    /// `get` attempts the bound supplier through the inner breaker and
    /// always prefers returning a usable value: a fresh one on success, the
    /// cached one on any failure. Only before the first success can an
    /// error reach the caller, since there is nothing to fall back to yet.
    pub fn get(&self) -> GateResult<T> {
        let supplier = Arc::clone(&self.supplier);
        match self.breaker.protected_run(move || supplier()) {
            Ok(value) => {
                *self.cache.write().unwrap() = Some(value.clone());
                Ok(value)
            }
            Err(err) => match self.cached() {
                Some(value) => {
                    logging::debug!(
                        "[MemoizingCircuitBreaker] serving cached value, dependency {}, cause {}",
                        self.bound_config().dependency,
                        err
                    );
                    Ok(value)
                }
                None => Err(err),
            },
        }
    }

    /// `cached` returns the most recent successful result, or `None` before
    /// any success. Repeated calls between `get` invocations return the
    /// same value.
    pub fn cached(&self) -> Option<T> {
        self.cache.read().unwrap().clone()
    }
}

impl<T> CircuitBreakerTrait for MemoizingCircuitBreaker<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn machine(&self) -> &BreakerMachine {
        self.breaker.machine()
    }
}
