use crate::{config as global_config, Error};
use serde::{Deserialize, Serialize};
use serde_json;
use std::fmt;
use std::time::Duration;

/// BreakerConfig encompasses the fields of one circuit breaker instance.
/// It is immutable: created once per guarded dependency and never mutated
/// after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// unique id
    pub id: String,
    /// name of the guarded remote dependency, used in logs and listener
    /// callbacks
    pub dependency: String,
    /// `max_consecutive_failures` is the failure-streak threshold before the
    /// dependency is declared down and the breaker opens.
    pub max_consecutive_failures: u32,
    /// `call_timeout_ms` bounds one invocation of the guarded supplier (in
    /// milliseconds). A timed-out task is detached, not cancelled.
    pub call_timeout_ms: u64,
    /// `recovery_period_ms` is how long the breaker stays Open (in
    /// milliseconds) before permitting a probe.
    pub recovery_period_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfig {
            id: uuid::Uuid::new_v4().to_string(),
            dependency: String::default(),
            max_consecutive_failures: global_config::default_max_consecutive_failures(),
            call_timeout_ms: global_config::default_call_timeout_ms(),
            recovery_period_ms: global_config::default_recovery_period_ms(),
        }
    }
}

impl BreakerConfig {
    pub fn is_valid(&self) -> crate::Result<()> {
        if self.dependency.is_empty() {
            return Err(Error::msg("empty dependency name"));
        }
        if self.max_consecutive_failures == 0 {
            return Err(Error::msg("invalid max_consecutive_failures"));
        }
        if self.call_timeout_ms == 0 {
            return Err(Error::msg("invalid call_timeout_ms"));
        }
        if self.recovery_period_ms == 0 {
            return Err(Error::msg("invalid recovery_period_ms"));
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl PartialEq for BreakerConfig {
    fn eq(&self, other: &Self) -> bool {
        self.dependency == other.dependency
            && self.max_consecutive_failures == other.max_consecutive_failures
            && self.call_timeout_ms == other.call_timeout_ms
            && self.recovery_period_ms == other.recovery_period_ms
    }
}

impl fmt::Display for BreakerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", fmtted)
    }
}
