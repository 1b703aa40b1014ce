//! Configuration Loader
//!
//! Handles locating tickvm.toml and layering environment overrides on top.

use crate::vm_config::{LoggingConfig, PowBitOrderSetting, RuntimeConfig, StorageConfig, VmConfig};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// File name searched for when walking up from a start directory.
pub const CONFIG_FILE_NAME: &str = "tickvm.toml";

/// Configuration loader
///
/// Precedence, lowest first:
/// 1. Built-in defaults
/// 2. Project config (tickvm.toml)
/// 3. Environment variables (TICKVM_*)
/// 4. CLI flags (handled by caller)
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Skip TICKVM_* overrides
    ignore_env: bool,
}

/// Loaded configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Effective VM configuration
    pub vm: VmConfig,

    /// File the configuration came from, if any
    pub source: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { ignore_env: false }
    }

    /// Loader that does not read TICKVM_* variables
    pub fn without_env() -> Self {
        Self { ignore_env: true }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find tickvm.toml. A missing file is not
    /// an error; defaults are used instead.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<Config> {
        let (source, vm) = self.find_config(start_dir)?;
        let vm = self.apply_env_overrides(vm)?;
        vm.validate()?;
        Ok(Config { vm, source })
    }

    /// Load configuration from a specific file
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<Config> {
        let vm = VmConfig::load_from_file(config_path)?;
        let vm = self.apply_env_overrides(vm)?;
        vm.validate()?;
        Ok(Config {
            vm,
            source: Some(config_path.to_path_buf()),
        })
    }

    fn find_config(&self, start_dir: &Path) -> ConfigResult<(Option<PathBuf>, VmConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.exists() {
                let config = VmConfig::load_from_file(&config_path)?;
                return Ok((Some(config_path), config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, VmConfig::default())),
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Recognized: TICKVM_SAVE_DIR, TICKVM_LOG, TICKVM_POW_BIT_ORDER,
    /// TICKVM_MAX_LOOP_ITERATIONS.
    fn apply_env_overrides(&self, mut config: VmConfig) -> ConfigResult<VmConfig> {
        if self.ignore_env {
            return Ok(config);
        }

        if let Ok(dir) = env::var("TICKVM_SAVE_DIR") {
            config.storage = Some(StorageConfig {
                save_dir: Some(PathBuf::from(dir)),
            });
        }

        if let Ok(filter) = env::var("TICKVM_LOG") {
            config.logging = Some(LoggingConfig {
                filter: Some(filter),
            });
        }

        if let Ok(order) = env::var("TICKVM_POW_BIT_ORDER") {
            let order: PowBitOrderSetting = order.parse()?;
            config.compat.get_or_insert_with(Default::default).pow_bit_order = Some(order);
        }

        if let Ok(limit) = env::var("TICKVM_MAX_LOOP_ITERATIONS") {
            let limit = limit.parse::<u32>().map_err(|e| ConfigError::InvalidValue {
                field: "TICKVM_MAX_LOOP_ITERATIONS".to_string(),
                reason: e.to_string(),
            })?;
            config
                .runtime
                .get_or_insert_with(RuntimeConfig::default)
                .max_loop_iterations = Some(limit);
        }

        Ok(config)
    }
}

impl Config {
    /// Whether a tickvm.toml was found
    pub fn has_file(&self) -> bool {
        self.source.is_some()
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(&self.vm).unwrap_or_default()
    }
}
