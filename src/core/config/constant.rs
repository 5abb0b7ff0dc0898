// default app settings
pub const CALLGUARD_VERSION: &str = "v1";
pub const DEFAULT_APP_NAME: &str = "unknown_service";
pub const APP_NAME_ENV_KEY: &str = "CALLGUARD_APP_NAME";
pub const CONF_FILE_PATH_ENV_KEY: &str = "CALLGUARD_CONFIG_FILE_PATH";
pub const CONFIG_FILENAME: &str = "USE_DEFAULT_CONFIGURATION";

// default executor settings
pub const DEFAULT_POOL_SIZE: usize = 4;

// default breaker settings.
// One failure already degrades trust (Closed goes to Half-Open), so the
// streak threshold only governs how many consecutive failures are tolerated
// before the breaker opens completely.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 5;
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_RECOVERY_PERIOD_MS: u64 = 10000;

// default log settings
pub const DEFAULT_LOG_LEVEL: &str = "warn";
pub const LOG_CONFIG_FILE: &str = "testdata/config/log4rs.yaml";
