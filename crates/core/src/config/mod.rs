//! Cache configuration with layered loading.
//!
//! Sources, lowest to highest precedence:
//!
//! 1. Built-in defaults
//! 2. TOML config file (if PCACHE_CONFIG_FILE set)
//! 3. Environment variables (PCACHE_*)

use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Where cache files live and how much of them to keep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding every `<key>.db_file` / `<key>.journal_file` pair.
    ///
    /// Set via PCACHE_ROOT_DIR environment variable.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Number of opened backend params kept by the manager.
    ///
    /// Set via PCACHE_PARAMS_CACHE_CAPACITY environment variable.
    #[serde(default = "default_params_cache_capacity")]
    pub params_cache_capacity: usize,

    /// Footprint that eviction brings the root directory down to.
    ///
    /// Set via PCACHE_TARGET_FOOTPRINT_BYTES environment variable.
    #[serde(default = "default_target_footprint_bytes")]
    pub target_footprint_bytes: u64,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("./pcache")
}

fn default_params_cache_capacity() -> usize {
    100
}

fn default_target_footprint_bytes() -> u64 {
    100 * 1024 * 1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            params_cache_capacity: default_params_cache_capacity(),
            target_footprint_bytes: default_target_footprint_bytes(),
        }
    }
}

impl CacheConfig {
    /// Load configuration from all sources, then validate it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed, or
    /// if validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(Env::prefixed("PCACHE_").map(|key| key.as_str().to_lowercase().into()));

        Self::extract(figment)
    }

    /// Load from an explicit TOML file layered over defaults, ignoring the
    /// environment.
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        Self::extract(Figment::from(Serialized::defaults(Self::default())).merge(Toml::file(path.as_ref())))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
