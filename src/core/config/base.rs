use super::{constant::*, ConfigEntity};
use crate::{logging, utils, Error, Result};
use serde_yaml;
use std::env;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;
use std::sync::RwLock;

use lazy_static::lazy_static;

lazy_static! {
    static ref GLOBAL_CONFIG: RwLock<ConfigEntity> = RwLock::new(ConfigEntity::new());
}

pub fn reset_global_config(entity: ConfigEntity) {
    *GLOBAL_CONFIG.write().unwrap() = entity;
}

// init_config_with_yaml loads general configuration from the YAML file under the provided path.
pub fn init_config_with_yaml(config_path: &mut String) -> Result<()> {
    // Initialize general config and logging module.
    apply_yaml_config_file(config_path)?;
    override_items_from_system_env()?;
    #[cfg(any(feature = "logger_env", feature = "logger_log4rs"))]
    init_log()?;
    Ok(())
}

// apply_yaml_config_file loads general configuration from the given YAML file.
fn apply_yaml_config_file(config_path: &mut String) -> Result<()> {
    // Priority: system environment > YAML file > default config
    if utils::is_blank(config_path) {
        // If the config file path is absent, callguard will try to resolve it from the system env.
        *config_path = env::var(CONF_FILE_PATH_ENV_KEY).unwrap_or_else(|_| CONFIG_FILENAME.into());
    }
    // First callguard will try to load config from the given file.
    // If the path is empty (not set), callguard will use the default config.
    load_global_config_from_yaml_file(config_path)?;
    Ok(())
}

fn load_global_config_from_yaml_file(path_str: &String) -> Result<()> {
    let path = Path::new(path_str);
    if path_str == CONFIG_FILENAME {
        // use the default global config.
        return Ok(());
    }
    if !path.exists() {
        return Err(Error::msg(
            "callguard YAML configuration file does not exist!",
        ));
    }
    let mut file = File::open(path)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    let entity: ConfigEntity = serde_yaml::from_str(&content)?;
    entity.check()?;
    logging::info!(
        "[Config] Resolving callguard config from file, file {}",
        path_str
    );
    reset_global_config(entity);
    Ok(())
}

pub(crate) fn override_items_from_system_env() -> Result<()> {
    let app_name = env::var(APP_NAME_ENV_KEY).unwrap_or_else(|_| DEFAULT_APP_NAME.into());

    let mut cfg = GLOBAL_CONFIG.write().unwrap();
    if !utils::is_blank(&app_name) {
        cfg.config.app.app_name = app_name;
    }
    cfg.check()?;
    Ok(())
}

#[cfg(any(feature = "logger_env", feature = "logger_log4rs"))]
pub fn init_log() -> Result<()> {
    // If present, the value in the system env overrides the value in the config file.
    logging::logger_init(log_config_file());

    logging::info!("[Config] App name resolved, appName {}", app_name());
    logging::info!(
        "[Config] Print effective global config, globalConfig {:?}",
        &*GLOBAL_CONFIG.read().unwrap()
    );
    Ok(())
}

#[inline]
pub fn log_config_file() -> Option<String> {
    Some(GLOBAL_CONFIG.read().unwrap().config.log.config_file.clone())
}

#[inline]
pub fn app_name() -> String {
    GLOBAL_CONFIG.read().unwrap().config.app.app_name.clone()
}

#[inline]
pub fn executor_pool_size() -> usize {
    GLOBAL_CONFIG.read().unwrap().config.executor.pool_size
}

#[inline]
pub fn default_max_consecutive_failures() -> u32 {
    GLOBAL_CONFIG
        .read()
        .unwrap()
        .config
        .breaker
        .max_consecutive_failures
}

#[inline]
pub fn default_call_timeout_ms() -> u64 {
    GLOBAL_CONFIG.read().unwrap().config.breaker.call_timeout_ms
}

#[inline]
pub fn default_recovery_period_ms() -> u64 {
    GLOBAL_CONFIG
        .read()
        .unwrap()
        .config
        .breaker
        .recovery_period_ms
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn accessors_follow_defaults() {
        assert_eq!(executor_pool_size(), DEFAULT_POOL_SIZE);
        assert_eq!(
            default_max_consecutive_failures(),
            DEFAULT_MAX_CONSECUTIVE_FAILURES
        );
        assert_eq!(default_call_timeout_ms(), DEFAULT_CALL_TIMEOUT_MS);
        assert_eq!(default_recovery_period_ms(), DEFAULT_RECOVERY_PERIOD_MS);
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut path = String::from("testdata/config/definitely_missing.yaml");
        assert!(init_config_with_yaml(&mut path).is_err());
    }
}
