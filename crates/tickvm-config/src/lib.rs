//! tickvm configuration
//!
//! Loads the settings that shape a VM instance: evaluation limits, the
//! integer-power compatibility rule, where save-state files live and the
//! default log filter.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Project config (`tickvm.toml`, found by walking up from the start directory)
//! 3. Environment variables (`TICKVM_*`)
//! 4. CLI flags (applied by the caller)
//!
//! # Example
//!
//! ```no_run
//! use tickvm_config::ConfigLoader;
//! use std::path::Path;
//!
//! let loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("saves go to {}", config.vm.save_dir().display());
//! ```

pub mod loader;
pub mod vm_config;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

pub use loader::{Config, ConfigLoader, CONFIG_FILE_NAME};
pub use vm_config::{
    CompatConfig, LoggingConfig, PowBitOrderSetting, RuntimeConfig, StorageConfig, VmConfig,
    DEFAULT_LOG_FILTER, DEFAULT_MAX_LOOP_ITERATIONS, DEFAULT_MAX_STATE_CHANGES,
    DEFAULT_STACK_CAPACITY,
};
