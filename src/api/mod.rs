//! mod `api` provides the topmost fundamental APIs for users of callguard.
//! Users must initialize callguard before creating breakers. callguard
//! supports three ways to perform initialization:
//!
//!  1. `init_default()`, using default config to initialize.
//!  2. `init_with_config(config_entity: ConfigEntity)`, using a customized config entity to initialize.
//!  3. `init_with_config_file(config_path: &mut String)`, using a yaml file to initialize.

mod init;

pub use init::*;
