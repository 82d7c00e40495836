//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "fetch.timeout_ms must be > 0".into(),
            ));
        }
        if self.resize.target_width == 0 {
            return Err(ConfigError::ValidationError(
                "resize.target_width must be > 0".into(),
            ));
        }
        if self.limits.max_workers_per_stage == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_workers_per_stage must be > 0".into(),
            ));
        }
        if self.general.storage_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "general.storage_dir must not be empty".into(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }
        Ok(())
    }
}
