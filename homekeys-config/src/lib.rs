//! Configuration management for homekeys tools

use config::{Config, ConfigError, Environment};
use homekeys_keyring::key_types::DEFAULT_KEYRING_SUBDIR;
use homekeys_keyring::lock::{LOCK_TIMEOUT_MILLISECONDS, MAX_LOCK_TIMEOUTS};
use homekeys_keyring::{KeyringOptions, LockPolicy};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable prefix, e.g. `HOMEKEYS_LOG_LEVEL`
pub const ENV_PREFIX: &str = "HOMEKEYS";

/// Keyring tool configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct KeyringSettings {
    /// Use this directory instead of looking up the user's home
    pub home_dir: Option<PathBuf>,
    pub keyring_subdir: String,
    pub lock_max_timeouts: u32,
    pub lock_timeout_ms: u64,
    pub log_level: String,
    /// `console` or `json`
    pub log_format: String,
}

impl KeyringSettings {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        Self::from_environment(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    fn from_environment(environment: Environment) -> Result<Self, ConfigError> {
        let settings: Self = Config::builder()
            .set_default("keyring_subdir", DEFAULT_KEYRING_SUBDIR)?
            .set_default("lock_max_timeouts", i64::from(MAX_LOCK_TIMEOUTS))?
            .set_default("lock_timeout_ms", LOCK_TIMEOUT_MILLISECONDS as i64)?
            .set_default("log_level", "info")?
            .set_default("log_format", "console")?
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.keyring_subdir.is_empty() {
            return Err(ConfigError::Message(
                "keyring_subdir must not be empty".to_string(),
            ));
        }

        match self.log_format.as_str() {
            "console" | "json" => Ok(()),
            other => Err(ConfigError::Message(format!(
                "log_format must be console or json, got {}",
                other
            ))),
        }
    }

    /// Options for opening keyrings with these settings
    pub fn keyring_options(&self) -> KeyringOptions {
        KeyringOptions {
            subdir: self.keyring_subdir.clone(),
            lock_policy: LockPolicy::new(
                self.lock_max_timeouts,
                Duration::from_millis(self.lock_timeout_ms),
            ),
        }
    }

    pub fn json_logs(&self) -> bool {
        self.log_format == "json"
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}
