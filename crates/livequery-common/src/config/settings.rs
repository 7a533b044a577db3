//! Client settings
//!
//! Loads settings from environment variables or accepts them directly.

use parking_lot::RwLock;
use serde::Deserialize;
use std::env;
use std::sync::Arc;

/// Settings a LiveQuery client is constructed from
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Application identifier sent on connect
    pub application_id: String,
    /// JavaScript key sent on connect, if the app uses one
    #[serde(default)]
    pub javascript_key: Option<String>,
    /// Master key; takes precedence over the JavaScript key on the server
    #[serde(default)]
    pub master_key: Option<String>,
    /// Explicit LiveQuery server URL (`ws://` or `wss://`)
    #[serde(default)]
    pub live_query_server_url: Option<String>,
    /// REST endpoint the socket URL is derived from when no explicit
    /// LiveQuery URL is configured
    #[serde(default = "default_server_url")]
    pub server_url: String,
}

/// REST endpoint assumed when `SERVER_URL` is not set
fn default_server_url() -> String {
    "https://api.parse.com/1".to_string()
}

impl Settings {
    /// Create settings with only the required application id set
    pub fn new(application_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            javascript_key: None,
            master_key: None,
            live_query_server_url: None,
            server_url: default_server_url(),
        }
    }

    /// Set the JavaScript key
    pub fn with_javascript_key(mut self, key: impl Into<String>) -> Self {
        self.javascript_key = Some(key.into());
        self
    }

    /// Set the master key
    pub fn with_master_key(mut self, key: impl Into<String>) -> Self {
        self.master_key = Some(key.into());
        self
    }

    /// Set an explicit LiveQuery server URL
    pub fn with_live_query_server_url(mut self, url: impl Into<String>) -> Self {
        self.live_query_server_url = Some(url.into());
        self
    }

    /// Set the REST endpoint
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    /// Load settings from environment variables
    ///
    /// # Errors
    /// Returns an error if `APPLICATION_ID` is missing
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            application_id: env::var("APPLICATION_ID")
                .map_err(|_| ConfigError::MissingVar("APPLICATION_ID"))?,
            javascript_key: env::var("JAVASCRIPT_KEY").ok(),
            master_key: env::var("MASTER_KEY").ok(),
            live_query_server_url: env::var("LIVEQUERY_SERVER_URL").ok(),
            server_url: env::var("SERVER_URL").unwrap_or_else(|_| default_server_url()),
        })
    }
}

/// Shared handle to mutable settings.
///
/// Clones share the same storage, so a store handed to a session
/// controller observes later updates. A client built from the store keeps
/// the snapshot taken at construction time.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    inner: Arc<RwLock<Settings>>,
}

impl SettingsStore {
    /// Wrap settings in a shared store
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Load a store from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(Settings::from_env()?))
    }

    /// Copy of the current settings
    pub fn snapshot(&self) -> Settings {
        self.inner.read().clone()
    }

    /// Apply an arbitrary mutation to the settings
    pub fn update(&self, f: impl FnOnce(&mut Settings)) {
        f(&mut self.inner.write());
    }

    /// Replace the application id
    pub fn set_application_id(&self, application_id: impl Into<String>) {
        self.inner.write().application_id = application_id.into();
    }

    /// Replace the JavaScript key
    pub fn set_javascript_key(&self, key: Option<String>) {
        self.inner.write().javascript_key = key;
    }

    /// Replace the master key
    pub fn set_master_key(&self, key: Option<String>) {
        self.inner.write().master_key = key;
    }

    /// Replace the explicit LiveQuery server URL
    pub fn set_live_query_server_url(&self, url: Option<String>) {
        self.inner.write().live_query_server_url = url;
    }

    /// Replace the REST endpoint
    pub fn set_server_url(&self, url: impl Into<String>) {
        self.inner.write().server_url = url.into();
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
