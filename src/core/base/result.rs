//! Result types shared between the executor and the circuit breakers.

use crate::{utils, Error};
use std::fmt;

/// `CallOutcome` is the transient outcome of one attempt of a guarded call.
/// It is produced per invocation by [`crate::executor::TaskHandle::wait_for`]
/// and consumed immediately to decide the next breaker transition; it is
/// never persisted.
#[derive(Debug)]
pub enum CallOutcome<T> {
    /// The supplier returned a value within the time bound.
    Success(T),
    /// The supplier returned an error or panicked.
    Failure(Error),
    /// The supplier did not complete within the time bound. The underlying
    /// task keeps running detached; its late result is discarded.
    Timeout,
}

impl<T> CallOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// `GateError` is the error taxonomy of the gate's public boundary. All
/// variants are returned, never thrown across `protected_run`/`get`.
#[derive(Debug)]
pub enum GateError {
    /// Fast-fail: the breaker declined to attempt the call because it is
    /// protecting a known-bad dependency. `retry_at_ms` is the unix
    /// timestamp at which the next probe will be permitted.
    Open { retry_at_ms: u64 },
    /// The guarded call exceeded the configured call timeout.
    Timeout { timeout_ms: u64 },
    /// The guarded operation itself returned an error or panicked.
    Underlying(Error),
}

pub type GateResult<T> = std::result::Result<T, GateError>;

impl GateError {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_underlying(&self) -> bool {
        matches!(self, Self::Underlying(_))
    }

    /// The underlying cause, if this error carries one.
    pub fn cause(&self) -> Option<&Error> {
        match self {
            Self::Underlying(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateError::Open { retry_at_ms } => write!(
                f,
                "GateError::Open: circuit open, next probe permitted at {}",
                utils::format_time_millis(*retry_at_ms)
            ),
            GateError::Timeout { timeout_ms } => {
                write!(f, "GateError::Timeout: call exceeded {} ms", timeout_ms)
            }
            GateError::Underlying(err) => write!(f, "GateError::Underlying: {}", err),
        }
    }
}

impl std::error::Error for GateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GateError::Underlying(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn outcome_predicates() {
        let success: CallOutcome<u32> = CallOutcome::Success(1);
        let failure: CallOutcome<u32> = CallOutcome::Failure(Error::msg("boom"));
        let timeout: CallOutcome<u32> = CallOutcome::Timeout;
        assert!(success.is_success());
        assert!(failure.is_failure());
        assert!(timeout.is_timeout());
        assert!(!timeout.is_failure());
    }

    #[test]
    fn error_predicates() {
        let open = GateError::Open { retry_at_ms: 0 };
        let timeout = GateError::Timeout { timeout_ms: 500 };
        let underlying = GateError::Underlying(Error::msg("connection refused"));
        assert!(open.is_open());
        assert!(timeout.is_timeout());
        assert!(underlying.is_underlying());
        assert!(open.cause().is_none());
        assert!(underlying.cause().is_some());
    }

    #[test]
    fn error_display() {
        let timeout = GateError::Timeout { timeout_ms: 500 };
        assert_eq!(
            format!("{}", timeout),
            "GateError::Timeout: call exceeded 500 ms"
        );
        let underlying = GateError::Underlying(Error::msg("connection refused"));
        assert_eq!(
            format!("{}", underlying),
            "GateError::Underlying: connection refused"
        );
    }
}
