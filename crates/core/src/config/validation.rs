//! Configuration validation rules.

use crate::config::CacheConfig;
use thiserror::Error;

/// Upper bound on opened params kept in memory; each holds two descriptors.
const MAX_PARAMS_CACHE_CAPACITY: usize = 10_000;

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl CacheConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `params_cache_capacity` is 0 or exceeds 10,000
    /// - `root_dir` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.params_cache_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "params_cache_capacity".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.params_cache_capacity > MAX_PARAMS_CACHE_CAPACITY {
            return Err(ConfigError::Invalid {
                field: "params_cache_capacity".into(),
                reason: format!("must not exceed {MAX_PARAMS_CACHE_CAPACITY}"),
            });
        }

        if self.root_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid { field: "root_dir".into(), reason: "must not be empty".into() });
        }

        if self.target_footprint_bytes == 0 {
            tracing::warn!("target_footprint_bytes is 0; eviction will delete every cache database");
        }

        Ok(())
    }
}
