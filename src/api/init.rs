use crate::config::{self, ConfigEntity};
use crate::Result;

/// `init_default` initializes callguard with the default configuration,
/// overridden by the supported system environment variables.
pub fn init_default() -> Result<()> {
    config::override_items_from_system_env()?;
    #[cfg(any(feature = "logger_env", feature = "logger_log4rs"))]
    config::init_log()?;
    Ok(())
}

/// `init_with_config` initializes callguard from a hand-crafted
/// `ConfigEntity`.
pub fn init_with_config(config_entity: ConfigEntity) -> Result<()> {
    config_entity.check()?;
    config::reset_global_config(config_entity);
    config::override_items_from_system_env()?;
    #[cfg(any(feature = "logger_env", feature = "logger_log4rs"))]
    config::init_log()?;
    Ok(())
}

/// `init_with_config_file` initializes callguard from the YAML file under
/// the given path. An empty path falls back to the
/// `CALLGUARD_CONFIG_FILE_PATH` environment variable, then to defaults.
pub fn init_with_config_file(config_path: &mut String) -> Result<()> {
    config::init_config_with_yaml(config_path)
}
