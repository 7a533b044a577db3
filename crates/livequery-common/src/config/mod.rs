//! Configuration structs

mod settings;

pub use settings::{ConfigError, Settings, SettingsStore};
