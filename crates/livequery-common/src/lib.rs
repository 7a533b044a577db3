//! # livequery-common
//!
//! Shared utilities: settings storage, the current-user lookup trait, and
//! telemetry setup.

pub mod auth;
pub mod config;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use auth::{CurrentUser, StaticUserProvider, UserProvider};
pub use config::{ConfigError, Settings, SettingsStore};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
