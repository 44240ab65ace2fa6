//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (GEOFRESH_*)
//! 2. TOML config file (if GEOFRESH_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use chrono::Weekday;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (GEOFRESH_*)
/// 2. TOML config file (if GEOFRESH_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// URL the database file is downloaded from.
    ///
    /// Set via GEOFRESH_BASE_URL environment variable. Required.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Local path holding the last successfully downloaded database.
    ///
    /// Set via GEOFRESH_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via GEOFRESH_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Fetch timeout in milliseconds, covering the whole download.
    ///
    /// Set via GEOFRESH_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum accepted database size in bytes.
    ///
    /// Set via GEOFRESH_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Weekday the origin publishes new releases on.
    ///
    /// Set via GEOFRESH_RELEASE_WEEKDAY environment variable ("wednesday", "tue", ...).
    #[serde(default = "default_release_weekday")]
    pub release_weekday: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./GeoLite2-City.mmdb")
}

fn default_user_agent() -> String {
    "geofresh/0.1".into()
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_max_bytes() -> usize {
    256 * 1024 * 1024
}

fn default_release_weekday() -> String {
    "wednesday".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            release_weekday: default_release_weekday(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `GEOFRESH_`
    /// 2. TOML file from `GEOFRESH_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("GEOFRESH_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("GEOFRESH_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// The origin URL, which has no default.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the base URL is not set.
    pub fn require_base_url(&self) -> Result<&str, ConfigError> {
        self.base_url.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "base_url".into(),
            hint: "Set GEOFRESH_BASE_URL environment variable".into(),
        })
    }

    /// Parsed release weekday.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the value is not a weekday name.
    pub fn release_weekday(&self) -> Result<Weekday, ConfigError> {
        self.release_weekday.trim().parse::<Weekday>().map_err(|_| ConfigError::Invalid {
            field: "release_weekday".into(),
            reason: format!("'{}' is not a weekday name", self.release_weekday),
        })
    }
}
