//!  Circuit Breaker State Machine:
//!
//!                          streak reaches threshold
//!
//!     +----------------+                  +----------------+                 +----------------+
//!     |                |  First failure   |                |---------------->|                |
//!     |                |----------------->|                |                 |                |
//!     |     Closed     |                  |    HalfOpen    |     Probe       |      Open      |
//!     |                | Attempt succeeds |                |<----------------|                |
//!     |                |<-----------------|                |  after recovery |                |
//!     +----------------+                  +----------------+                 +----------------+
//!
//! A single failure is treated as a meaningful signal immediately (Closed
//! goes to HalfOpen) rather than requiring a failure count while fully
//! trusted. The probe permitted after the recovery period re-uses the same
//! failure streak, so a dependency that is still down degrades back to Open
//! on the first failed probe.

pub mod breaker;
pub mod config;
pub mod memoizing;

pub use self::breaker::*;
pub use self::config::*;
pub use self::memoizing::*;

use crate::{logging, utils};
use crate::base::{GateError, GateResult};
use lazy_static::lazy_static;
use std::sync::{Arc, Mutex};

/// States of the Circuit Breaker State Machine
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum State {
    Closed,
    HalfOpen,
    Open,
}

impl Default for State {
    fn default() -> State {
        State::Closed
    }
}

/// `StateChangeListener` listens on the circuit breaker state change event
pub trait StateChangeListener: Sync + Send {
    /// `on_transform_to_closed` is triggered when a circuit breaker state transformed to Closed.
    fn on_transform_to_closed(&self, prev: State, config: Arc<BreakerConfig>);

    /// `on_transform_to_open` is triggered when a circuit breaker state transformed to Open.
    /// `failure_streak` is the consecutive-failure count that triggered the transformation.
    fn on_transform_to_open(&self, prev: State, config: Arc<BreakerConfig>, failure_streak: u32);

    /// `on_transform_to_half_open` is triggered when a circuit breaker state transformed to HalfOpen.
    fn on_transform_to_half_open(&self, prev: State, config: Arc<BreakerConfig>);
}

lazy_static! {
    pub static ref STATE_CHANGE_LISTENERS: Mutex<Vec<Arc<dyn StateChangeListener>>> =
        Mutex::new(Vec::new());
}

pub fn state_change_listeners() -> &'static Mutex<Vec<Arc<dyn StateChangeListener>>> {
    &STATE_CHANGE_LISTENERS
}

/// `register_state_change_listeners` registers global state change listeners for all circuit breakers
pub fn register_state_change_listeners(mut listeners: Vec<Arc<dyn StateChangeListener>>) {
    if listeners.is_empty() {
        return;
    }
    STATE_CHANGE_LISTENERS
        .lock()
        .unwrap()
        .append(&mut listeners);
}

/// `clear_state_change_listeners` clears all the registered `StateChangeListener`s
pub fn clear_state_change_listeners() {
    STATE_CHANGE_LISTENERS.lock().unwrap().clear();
}

/// `CircuitBreakerTrait` is the basic trait shared by both breaker
/// variants; the state machine itself lives in [`BreakerMachine`].
pub trait CircuitBreakerTrait: Send + Sync {
    /// `machine` returns the associated state machine.
    fn machine(&self) -> &BreakerMachine;

    /// `bound_config` returns the associated breaker configuration.
    #[inline]
    fn bound_config(&self) -> &Arc<BreakerConfig> {
        self.machine().bound_config()
    }

    /// `current_state` returns the current state of the circuit breaker.
    #[inline]
    fn current_state(&self) -> State {
        self.machine().current_state()
    }

    /// `failure_streak` returns the count of consecutive non-success
    /// outcomes since the last success or state entry.
    #[inline]
    fn failure_streak(&self) -> u32 {
        self.machine().failure_streak()
    }
}

#[derive(Debug, Default)]
struct MachineInner {
    state: State,
    /// Consecutive non-success outcomes since the last success. Reset to
    /// zero whenever Closed is entered.
    failure_streak: u32,
    /// Unix timestamp until which the breaker stays Open. Meaningful only
    /// while Open; cleared on leaving Open.
    recovery_deadline_ms: u64,
}

/// `BreakerMachine` encompasses the state shared by the circuit breaker
/// variants: the bound configuration plus the mutable machine fields.
///
/// Every check-then-act decision and every transition write happens under
/// one mutex, so concurrent callers on the same breaker can never both
/// believe they own the first probe after recovery. The guarded attempt
/// itself always runs with the lock released.
#[derive(Debug)]
pub struct BreakerMachine {
    config: Arc<BreakerConfig>,
    inner: Mutex<MachineInner>,
}

impl BreakerMachine {
    pub fn new(config: Arc<BreakerConfig>) -> Self {
        BreakerMachine {
            config,
            inner: Mutex::new(MachineInner::default()),
        }
    }

    pub fn bound_config(&self) -> &Arc<BreakerConfig> {
        &self.config
    }

    pub fn current_state(&self) -> State {
        self.inner.lock().unwrap().state
    }

    pub fn failure_streak(&self) -> u32 {
        self.inner.lock().unwrap().failure_streak
    }

    /// `recovery_deadline_ms` returns the probe deadline, or 0 while the
    /// breaker is not Open.
    pub fn recovery_deadline_ms(&self) -> u64 {
        self.inner.lock().unwrap().recovery_deadline_ms
    }

    /// `try_acquire` decides whether an invocation may be attempted right
    /// now. While Open before the recovery deadline it fast-fails; once the
    /// deadline has passed, exactly one caller performs the Open to
    /// HalfOpen transition and proceeds as the probe, later callers simply
    /// observe HalfOpen.
    pub fn try_acquire(&self) -> GateResult<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Closed | State::HalfOpen => Ok(()),
            State::Open => {
                if utils::curr_time_millis() >= inner.recovery_deadline_ms {
                    inner.state = State::HalfOpen;
                    inner.recovery_deadline_ms = 0;
                    self.notify_half_open(State::Open);
                    logging::debug!(
                        "[CircuitBreaker] recovery period elapsed, probing, dependency {}",
                        self.config.dependency
                    );
                    Ok(())
                } else {
                    Err(GateError::Open {
                        retry_at_ms: inner.recovery_deadline_ms,
                    })
                }
            }
        }
    }

    /// `on_attempt_complete` records the outcome of a finished attempt and
    /// applies the resulting transition. Called only by the thread that just
    /// completed the attempt, so transitions stay serialized through the
    /// machine mutex.
    pub fn on_attempt_complete(&self, success: bool) {
        let mut inner = self.inner.lock().unwrap();
        if success {
            let prev = inner.state;
            // The attempt was admitted before another thread re-opened the
            // breaker; like a late failure, its outcome is dropped without
            // a transition. Recovery stays gated on the probe deadline.
            if prev == State::Open {
                return;
            }
            inner.failure_streak = 0;
            inner.recovery_deadline_ms = 0;
            if prev != State::Closed {
                inner.state = State::Closed;
                self.notify_closed(prev);
                logging::debug!(
                    "[CircuitBreaker] transform to Closed, dependency {}",
                    self.config.dependency
                );
            }
            return;
        }
        match inner.state {
            State::Closed => {
                inner.state = State::HalfOpen;
                inner.failure_streak = 1;
                self.notify_half_open(State::Closed);
                logging::debug!(
                    "[CircuitBreaker] transform to HalfOpen on first failure, dependency {}",
                    self.config.dependency
                );
            }
            State::HalfOpen => {
                inner.failure_streak += 1;
                if inner.failure_streak >= self.config.max_consecutive_failures {
                    inner.state = State::Open;
                    inner.recovery_deadline_ms =
                        utils::curr_time_millis() + self.config.recovery_period_ms;
                    self.notify_open(State::HalfOpen, inner.failure_streak);
                    logging::warn!(
                        "[CircuitBreaker] transform to Open, dependency {}, failure streak {}, next probe at {}",
                        self.config.dependency,
                        inner.failure_streak,
                        utils::format_time_millis(inner.recovery_deadline_ms)
                    );
                }
            }
            // The completion raced with a re-open by another thread; the
            // outcome is dropped without a transition.
            State::Open => {}
        }
    }

    fn notify_closed(&self, prev: State) {
        let listeners = state_change_listeners().lock().unwrap();
        for listener in &*listeners {
            listener.on_transform_to_closed(prev, Arc::clone(&self.config));
        }
    }

    fn notify_half_open(&self, prev: State) {
        let listeners = state_change_listeners().lock().unwrap();
        for listener in &*listeners {
            listener.on_transform_to_half_open(prev, Arc::clone(&self.config));
        }
    }

    fn notify_open(&self, prev: State, failure_streak: u32) {
        let listeners = state_change_listeners().lock().unwrap();
        for listener in &*listeners {
            listener.on_transform_to_open(prev, Arc::clone(&self.config), failure_streak);
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use mockall::predicate::*;
    use mockall::*;

    mock! {
        pub(crate) StateListener {}
        impl StateChangeListener for StateListener {
            fn on_transform_to_closed(&self, prev: State, config: Arc<BreakerConfig>);
            fn on_transform_to_open(&self, prev: State, config: Arc<BreakerConfig>, failure_streak: u32);
            fn on_transform_to_half_open(&self, prev: State, config: Arc<BreakerConfig>);
        }
    }

    fn machine(max_failures: u32, recovery_period_ms: u64) -> BreakerMachine {
        BreakerMachine::new(Arc::new(BreakerConfig {
            dependency: "lms".into(),
            max_consecutive_failures: max_failures,
            call_timeout_ms: 500,
            recovery_period_ms,
            ..Default::default()
        }))
    }

    #[test]
    fn starts_closed_with_zero_streak() {
        let machine = machine(3, 1000);
        assert_eq!(machine.current_state(), State::Closed);
        assert_eq!(machine.failure_streak(), 0);
        assert!(machine.try_acquire().is_ok());
    }

    #[test]
    fn first_failure_degrades_to_half_open() {
        let machine = machine(3, 1000);
        machine.on_attempt_complete(false);
        assert_eq!(machine.current_state(), State::HalfOpen);
        assert_eq!(machine.failure_streak(), 1);
        // attempts are still permitted while HalfOpen
        assert!(machine.try_acquire().is_ok());
    }

    #[test]
    fn streak_reaching_threshold_opens() {
        let machine = machine(3, 1000);
        machine.on_attempt_complete(false);
        machine.on_attempt_complete(false);
        assert_eq!(machine.current_state(), State::HalfOpen);
        machine.on_attempt_complete(false);
        assert_eq!(machine.current_state(), State::Open);
        assert!(machine.recovery_deadline_ms() > utils::curr_time_millis());
        let err = machine.try_acquire().unwrap_err();
        assert!(err.is_open());
    }

    #[test]
    fn success_resets_streak_and_closes() {
        let machine = machine(3, 1000);
        machine.on_attempt_complete(false);
        machine.on_attempt_complete(false);
        machine.on_attempt_complete(true);
        assert_eq!(machine.current_state(), State::Closed);
        assert_eq!(machine.failure_streak(), 0);
    }

    #[test]
    fn closed_state_implies_zero_streak() {
        let machine = machine(2, 1000);
        machine.on_attempt_complete(false);
        machine.on_attempt_complete(true);
        assert_eq!(machine.current_state(), State::Closed);
        assert_eq!(machine.failure_streak(), 0);
        machine.on_attempt_complete(true);
        assert_eq!(machine.failure_streak(), 0);
    }

    #[test]
    fn probe_permitted_after_recovery_period() {
        let machine = machine(1, 50);
        // the first failure only degrades to HalfOpen, the second one
        // pushes the streak past the threshold
        machine.on_attempt_complete(false);
        machine.on_attempt_complete(false);
        assert_eq!(machine.current_state(), State::Open);
        assert!(machine.try_acquire().unwrap_err().is_open());
        utils::sleep_for_ms(80);
        assert!(machine.try_acquire().is_ok());
        assert_eq!(machine.current_state(), State::HalfOpen);
        // deadline is cleared on leaving Open
        assert_eq!(machine.recovery_deadline_ms(), 0);
    }

    #[test]
    fn straggler_completions_in_open_are_dropped() {
        let machine = machine(1, 60_000);
        machine.on_attempt_complete(false);
        machine.on_attempt_complete(false);
        assert_eq!(machine.current_state(), State::Open);
        let deadline = machine.recovery_deadline_ms();
        // outcomes admitted before the breaker opened land without effect,
        // regardless of whether the late attempt succeeded
        machine.on_attempt_complete(true);
        assert_eq!(machine.current_state(), State::Open);
        assert_eq!(machine.recovery_deadline_ms(), deadline);
        machine.on_attempt_complete(false);
        assert_eq!(machine.current_state(), State::Open);
        assert_eq!(machine.recovery_deadline_ms(), deadline);
        assert!(machine.try_acquire().unwrap_err().is_open());
    }

    #[test]
    fn failed_probe_reopens_with_fresh_deadline() {
        let machine = machine(2, 50);
        machine.on_attempt_complete(false);
        machine.on_attempt_complete(false);
        assert_eq!(machine.current_state(), State::Open);
        utils::sleep_for_ms(80);
        assert!(machine.try_acquire().is_ok());
        machine.on_attempt_complete(false);
        assert_eq!(machine.current_state(), State::Open);
        assert!(machine.recovery_deadline_ms() > utils::curr_time_millis());
    }

    #[test]
    #[ignore]
    fn listener_notified_on_open() {
        // the listener registry is global, so listener tests cannot run in
        // parallel with the other tests
        clear_state_change_listeners();
        let mut listener = MockStateListener::new();
        listener.expect_on_transform_to_half_open().returning(
            |prev: State, config: Arc<BreakerConfig>| {
                logging::debug!(
                    "transform to HalfOpen, dependency: {}, previous state: {:?}",
                    config.dependency,
                    prev
                );
            },
        );
        listener.expect_on_transform_to_open().once().returning(
            |prev: State, config: Arc<BreakerConfig>, failure_streak: u32| {
                logging::debug!(
                    "transform to Open, dependency: {}, previous state: {:?}, streak: {}",
                    config.dependency,
                    prev,
                    failure_streak
                );
            },
        );
        register_state_change_listeners(vec![Arc::new(listener)]);
        let machine = machine(2, 1000);
        machine.on_attempt_complete(false);
        machine.on_attempt_complete(false);
        clear_state_change_listeners();
        assert_eq!(machine.current_state(), State::Open);
    }

    #[test]
    #[ignore]
    fn listener_notified_on_probe() {
        clear_state_change_listeners();
        let mut listener = MockStateListener::new();
        listener.expect_on_transform_to_open().returning(|_, _, _| {});
        // notified once on the first failure and once on the probe
        listener
            .expect_on_transform_to_half_open()
            .times(2)
            .returning(|prev: State, config: Arc<BreakerConfig>| {
                logging::debug!(
                    "transform to HalfOpen, dependency: {}, previous state: {:?}",
                    config.dependency,
                    prev
                );
            });
        register_state_change_listeners(vec![Arc::new(listener)]);
        let machine = machine(1, 20);
        machine.on_attempt_complete(false);
        machine.on_attempt_complete(false);
        utils::sleep_for_ms(40);
        assert!(machine.try_acquire().is_ok());
        clear_state_change_listeners();
        assert_eq!(machine.current_state(), State::HalfOpen);
    }
}
