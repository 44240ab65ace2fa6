//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

const MAX_TIMEOUT_MS: u64 = 30 * 60 * 1000;
const MAX_DB_BYTES: usize = 1024 * 1024 * 1024;

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `base_url` is unset, and
    /// `ConfigError::Invalid` if:
    /// - `db_path` has no file name
    /// - `max_bytes` is 0 or exceeds 1GB
    /// - `timeout_ms` is less than 100ms or exceeds 30 minutes
    /// - `user_agent` is empty
    /// - `release_weekday` is not a weekday name
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.require_base_url()?;

        if self.db_path.file_name().is_none() {
            return Err(ConfigError::Invalid { field: "db_path".into(), reason: "must name a file".into() });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > MAX_DB_BYTES {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 1GB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 30 minutes (1800000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        self.release_weekday()?;

        Ok(())
    }
}
