use super::constant::*;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json;
use std::fmt;

#[derive(Serialize, Deserialize, Debug)]
pub struct AppConfig {
    // app_name represents the name of the current running service.
    pub app_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            app_name: DEFAULT_APP_NAME.into(),
        }
    }
}

// LogConfig represents the configuration of logging in callguard.
#[derive(Serialize, Deserialize, Debug)]
pub struct LogConfig {
    pub config_file: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            config_file: LOG_CONFIG_FILE.into(),
        }
    }
}

// ExecutorConfig represents the sizing of the shared bounded task executor.
// The pool is shared process-wide: a detached (timed-out) task keeps
// occupying a slot until it finishes, so the size must budget for leakage.
#[derive(Serialize, Deserialize, Debug)]
pub struct ExecutorConfig {
    pub pool_size: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

// BreakerDefaultsConfig carries the per-breaker parameters used when a
// `BreakerConfig` is built via `Default`. Individual breakers override them
// at construction.
#[derive(Serialize, Deserialize, Debug)]
pub struct BreakerDefaultsConfig {
    pub max_consecutive_failures: u32,
    pub call_timeout_ms: u64,
    pub recovery_period_ms: u64,
}

impl Default for BreakerDefaultsConfig {
    fn default() -> Self {
        BreakerDefaultsConfig {
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            recovery_period_ms: DEFAULT_RECOVERY_PERIOD_MS,
        }
    }
}

// GuardConfig represents the general configuration of callguard.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct GuardConfig {
    pub app: AppConfig,
    pub log: LogConfig,
    pub executor: ExecutorConfig,
    pub breaker: BreakerDefaultsConfig,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ConfigEntity {
    pub version: String,
    pub config: GuardConfig,
}

impl Default for ConfigEntity {
    fn default() -> Self {
        ConfigEntity {
            version: CALLGUARD_VERSION.into(),
            config: GuardConfig::default(),
        }
    }
}

impl ConfigEntity {
    pub fn new() -> Self {
        ConfigEntity::default()
    }

    pub fn check(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(Error::msg("empty version"));
        }
        if self.config.app.app_name.is_empty() {
            return Err(Error::msg("empty app name"));
        }
        if self.config.executor.pool_size == 0 {
            return Err(Error::msg(
                "illegal executor configuration: pool_size == 0",
            ));
        }
        if self.config.breaker.max_consecutive_failures == 0 {
            return Err(Error::msg(
                "illegal breaker configuration: max_consecutive_failures == 0",
            ));
        }
        if self.config.breaker.call_timeout_ms == 0 {
            return Err(Error::msg(
                "illegal breaker configuration: call_timeout_ms == 0",
            ));
        }
        if self.config.breaker.recovery_period_ms == 0 {
            return Err(Error::msg(
                "illegal breaker configuration: recovery_period_ms == 0",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for ConfigEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", fmtted)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_is_valid() {
        let entity = ConfigEntity::new();
        assert!(entity.check().is_ok());
    }

    #[test]
    #[should_panic(expected = "empty app name")]
    fn illegal_app_name() {
        let mut entity = ConfigEntity::new();
        entity.config.app.app_name = "".into();
        entity.check().unwrap();
    }

    #[test]
    #[should_panic(expected = "pool_size == 0")]
    fn illegal_pool_size() {
        let mut entity = ConfigEntity::new();
        entity.config.executor.pool_size = 0;
        entity.check().unwrap();
    }

    #[test]
    #[should_panic(expected = "max_consecutive_failures == 0")]
    fn illegal_threshold() {
        let mut entity = ConfigEntity::new();
        entity.config.breaker.max_consecutive_failures = 0;
        entity.check().unwrap();
    }

    #[test]
    fn yaml_roundtrip() {
        let entity = ConfigEntity::new();
        let content = serde_yaml::to_string(&entity).unwrap();
        let parsed: ConfigEntity = serde_yaml::from_str(&content).unwrap();
        assert!(parsed.check().is_ok());
        assert_eq!(parsed.config.executor.pool_size, DEFAULT_POOL_SIZE);
    }
}
