#![cfg_attr(docsrs, feature(doc_cfg))]

//! # callguard
//!
//! callguard is the resilient remote-call gate of an exam administration
//! platform. It protects the service against slow or failing external
//! dependencies (learning-management-system APIs, proctoring backends) by
//! bounding call latency, tracking failure streaks and recovering
//! automatically through a Closed / Half-Open / Open state machine.
//!
//! Three components are provided, leaf first:
//!
//! 1. [`executor::BoundedExecutor`] runs suppliers on a fixed-size worker
//!    pool and hands back a time-boundable [`executor::TaskHandle`].
//! 2. [`circuitbreaker::CircuitBreaker`] executes a supplier through the
//!    executor with a timeout and decides per call whether to invoke the
//!    dependency, keep probing it, or fail fast.
//! 3. [`circuitbreaker::MemoizingCircuitBreaker`] composes one fixed
//!    supplier with a circuit breaker and falls back to the last successful
//!    result instead of propagating failures.
//!
//! Generally, there are several steps when using callguard:
//! 1. Initialize the crate configuration once at service start-up.
//! 2. Create one breaker per logical remote dependency.
//! 3. Route every remote operation attempt through the breaker.
//!
//! ## Add Dependency
//!
//! Add the dependency in `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! callguard = { version = "0.1.0", features = ["full"] }
//! ```
//!
//! Optional features:
//! - logger_env: Use `env_logger` to initialize logging.
//! - logger_log4rs: Use `log4rs` to initialize logging.
//!
//! ## General Configurations and Initialization
//!
//! The `api` module provides following interfaces:
//!
//! - `init_default()`: Load configurations from environment variables. For
//!   undefined configurations, use default values.
//! - `init_with_config_file(config_path: &mut String)`: Load configurations
//!   from a YAML file.
//! - `init_with_config(config_entity: ConfigEntity)`: Use a hand-crafted
//!   `ConfigEntity` to initialize callguard.
//!
//! Example:
//!
//! ```rust
//! use callguard::{api, logging};
//! api::init_default().unwrap_or_else(|err| logging::error!("{:?}", err));
//! ```
//!
//! ## Guarding a Remote Dependency
//!
//! ```rust
//! use callguard::circuitbreaker::{BreakerConfig, CircuitBreaker};
//!
//! let breaker: CircuitBreaker<String> = CircuitBreaker::new(BreakerConfig {
//!     dependency: "lms_quiz_list".into(),
//!     max_consecutive_failures: 3,
//!     call_timeout_ms: 500,
//!     recovery_period_ms: 1000,
//!     ..Default::default()
//! })
//! .unwrap();
//!
//! match breaker.protected_run(|| fetch_quiz_list()) {
//!     Ok(quizzes) => { /* fresh data */ }
//!     Err(err) if err.is_open() => { /* dependency known bad, try later */ }
//!     Err(err) => { /* the dependency itself failed or timed out */ }
//! }
//! ```
//!
//! Where staleness is preferable to unavailability, bind the supplier once
//! into a `MemoizingCircuitBreaker` and call `get()`; the last successful
//! value is served whenever the guarded call fails or the breaker is open.

/// Top-level initialization API.
pub mod api;
/// Core implementations: shared result types, the global configuration,
/// the bounded task executor and the circuit breaker pair.
pub mod core;
/// Adapters for different logging crates.
pub mod logging;
// Utility functions, mostly around wall-clock time.
pub mod utils;

// re-export preludes
pub use crate::core::*;
pub use api::*;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
