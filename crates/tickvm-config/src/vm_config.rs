//! VM configuration (tickvm.toml)
//!
//! Every field is optional; accessors fall back to built-in defaults so an
//! empty file and a missing file behave the same.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default cap on state transitions one entity may chain within a tick.
pub const DEFAULT_MAX_STATE_CHANGES: u32 = 2500;
/// Default cap on iterations of a single loop block activation.
pub const DEFAULT_MAX_LOOP_ITERATIONS: u32 = 1_000_000;
/// Default initial capacity of the operand stack.
pub const DEFAULT_STACK_CAPACITY: usize = 64;
/// Default tracing filter directive.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Top-level configuration from tickvm.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct VmConfig {
    /// Evaluation limits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeConfig>,

    /// Compatibility switches for legacy content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compat: Option<CompatConfig>,

    /// Save-state file storage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,

    /// Logging defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Evaluation limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Maximum chained state changes per entity per tick (default: 2500)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_state_changes_per_tick: Option<u32>,

    /// Maximum iterations of one loop block activation (default: 1000000)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_loop_iterations: Option<u32>,

    /// Initial operand stack capacity (default: 64)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_capacity: Option<usize>,
}

/// Which bit order integer exponentiation uses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PowBitOrderSetting {
    /// Pick per program library from its declared engine version.
    #[default]
    Auto,
    /// Always low-to-high.
    Current,
    /// Always the legacy reversed order.
    Legacy,
}

impl std::str::FromStr for PowBitOrderSetting {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "current" => Ok(Self::Current),
            "legacy" => Ok(Self::Legacy),
            other => Err(ConfigError::InvalidValue {
                field: "compat.pow_bit_order".to_string(),
                reason: format!("expected auto, current or legacy, got '{}'", other),
            }),
        }
    }
}

/// Compatibility switches
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct CompatConfig {
    /// Integer power bit order (default: auto)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pow_bit_order: Option<PowBitOrderSetting>,

    /// Engine version majors that select the current order under `auto` (default: [1])
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_pow_majors: Option<Vec<u32>>,
}

/// Save-state storage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Root directory for save-state files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_dir: Option<PathBuf>,
}

/// Logging defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// tracing filter directive used when RUST_LOG is unset (default: "info")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl VmConfig {
    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(runtime) = &self.runtime {
            if runtime.max_state_changes_per_tick == Some(0) {
                return Err(ConfigError::InvalidValue {
                    field: "runtime.max_state_changes_per_tick".to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
            if runtime.max_loop_iterations == Some(0) {
                return Err(ConfigError::InvalidValue {
                    field: "runtime.max_loop_iterations".to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        if let Some(storage) = &self.storage {
            if let Some(dir) = &storage.save_dir {
                if dir.as_os_str().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: "storage.save_dir".to_string(),
                        reason: "path cannot be empty".to_string(),
                    });
                }
            }
        }

        if let Some(filter) = self.logging.as_ref().and_then(|l| l.filter.as_deref()) {
            if filter.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "logging.filter".to_string(),
                    reason: "filter cannot be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Merge another config into this one, section by section.
    /// Other config takes precedence for non-None values.
    pub fn merge(&mut self, other: &VmConfig) {
        if let Some(runtime) = &other.runtime {
            let mine = self.runtime.get_or_insert_with(Default::default);
            if runtime.max_state_changes_per_tick.is_some() {
                mine.max_state_changes_per_tick = runtime.max_state_changes_per_tick;
            }
            if runtime.max_loop_iterations.is_some() {
                mine.max_loop_iterations = runtime.max_loop_iterations;
            }
            if runtime.stack_capacity.is_some() {
                mine.stack_capacity = runtime.stack_capacity;
            }
        }
        if let Some(compat) = &other.compat {
            let mine = self.compat.get_or_insert_with(Default::default);
            if compat.pow_bit_order.is_some() {
                mine.pow_bit_order = compat.pow_bit_order;
            }
            if compat.current_pow_majors.is_some() {
                mine.current_pow_majors = compat.current_pow_majors.clone();
            }
        }
        if let Some(storage) = &other.storage {
            if storage.save_dir.is_some() {
                self.storage = Some(storage.clone());
            }
        }
        if let Some(logging) = &other.logging {
            if logging.filter.is_some() {
                self.logging = Some(logging.clone());
            }
        }
    }

    pub fn max_state_changes_per_tick(&self) -> u32 {
        self.runtime
            .as_ref()
            .and_then(|r| r.max_state_changes_per_tick)
            .unwrap_or(DEFAULT_MAX_STATE_CHANGES)
    }

    pub fn max_loop_iterations(&self) -> u32 {
        self.runtime
            .as_ref()
            .and_then(|r| r.max_loop_iterations)
            .unwrap_or(DEFAULT_MAX_LOOP_ITERATIONS)
    }

    pub fn stack_capacity(&self) -> usize {
        self.runtime
            .as_ref()
            .and_then(|r| r.stack_capacity)
            .unwrap_or(DEFAULT_STACK_CAPACITY)
    }

    pub fn pow_bit_order(&self) -> PowBitOrderSetting {
        self.compat
            .as_ref()
            .and_then(|c| c.pow_bit_order)
            .unwrap_or_default()
    }

    /// Whether an engine version major selects the current pow order under `auto`.
    pub fn is_current_pow_major(&self, major: u32) -> bool {
        match self.compat.as_ref().and_then(|c| c.current_pow_majors.as_ref()) {
            Some(majors) => majors.contains(&major),
            None => major == 1,
        }
    }

    /// Effective save directory.
    ///
    /// Falls back to `<data dir>/tickvm/saves`, or `./saves` when the platform
    /// has no data directory.
    pub fn save_dir(&self) -> PathBuf {
        if let Some(dir) = self.storage.as_ref().and_then(|s| s.save_dir.clone()) {
            return dir;
        }
        dirs::data_dir()
            .map(|d| d.join("tickvm").join("saves"))
            .unwrap_or_else(|| PathBuf::from("saves"))
    }

    pub fn log_filter(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.filter.as_deref())
            .unwrap_or(DEFAULT_LOG_FILTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_when_empty() {
        let config = VmConfig::default();
        assert_eq!(config.max_state_changes_per_tick(), 2500);
        assert_eq!(config.max_loop_iterations(), 1_000_000);
        assert_eq!(config.stack_capacity(), 64);
        assert_eq!(config.pow_bit_order(), PowBitOrderSetting::Auto);
        assert_eq!(config.log_filter(), "info");
        assert!(config.is_current_pow_major(1));
        assert!(!config.is_current_pow_major(0));
    }

    #[test]
    fn test_parse_all_sections() {
        let config: VmConfig = toml::from_str(
            r#"
[runtime]
max_state_changes_per_tick = 16
max_loop_iterations = 500

[compat]
pow_bit_order = "legacy"
current_pow_majors = [1, 2]

[storage]
save_dir = "/tmp/saves"

[logging]
filter = "tickvm_runtime=debug"
"#,
        )
        .unwrap();

        assert_eq!(config.max_state_changes_per_tick(), 16);
        assert_eq!(config.max_loop_iterations(), 500);
        assert_eq!(config.pow_bit_order(), PowBitOrderSetting::Legacy);
        assert!(config.is_current_pow_major(2));
        assert_eq!(config.save_dir(), PathBuf::from("/tmp/saves"));
        assert_eq!(config.log_filter(), "tickvm_runtime=debug");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<VmConfig, _> = toml::from_str("[runtime]\nturbo = true\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_loop_limit_invalid() {
        let config = VmConfig {
            runtime: Some(RuntimeConfig {
                max_loop_iterations: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "runtime.max_loop_iterations"
        ));
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base: VmConfig = toml::from_str("[runtime]\nmax_loop_iterations = 10\n").unwrap();
        let other: VmConfig =
            toml::from_str("[runtime]\nstack_capacity = 8\n[compat]\npow_bit_order = \"current\"\n")
                .unwrap();
        base.merge(&other);

        assert_eq!(base.max_loop_iterations(), 10);
        assert_eq!(base.stack_capacity(), 8);
        assert_eq!(base.pow_bit_order(), PowBitOrderSetting::Current);
    }

    #[test]
    fn test_pow_bit_order_from_str() {
        assert_eq!(
            "LEGACY".parse::<PowBitOrderSetting>().unwrap(),
            PowBitOrderSetting::Legacy
        );
        assert!("sideways".parse::<PowBitOrderSetting>().is_err());
    }
}
