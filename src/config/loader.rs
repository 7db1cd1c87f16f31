//! Configuration Loader
//!
//! Layers built-in defaults, an optional configuration file and `CRM_*`
//! environment overrides, then validates the result.

use super::error::{ConfigResult, ConfigurationError};
use super::CommandResponseConfig;
use crate::constants::system;
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads `CommandResponseConfig` from layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the default file locations plus environment overrides
    pub fn load() -> ConfigResult<CommandResponseConfig> {
        let base = PathBuf::from(system::DEFAULT_CONFIG_DIR).join(system::DEFAULT_CONFIG_STEM);
        let builder = Config::builder()
            .add_source(File::with_name(&base.display().to_string()).required(false));
        Self::finish(builder, &base)
    }

    /// Load from an explicit file, which must exist, plus environment overrides
    pub fn load_from_file(path: &Path) -> ConfigResult<CommandResponseConfig> {
        if !path.is_file() {
            return Err(ConfigurationError::ConfigFileNotFound {
                path: path.to_path_buf(),
            });
        }
        let builder = Config::builder().add_source(File::from(path));
        Self::finish(builder, path)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        origin: &Path,
    ) -> ConfigResult<CommandResponseConfig> {
        let config: CommandResponseConfig = builder
            .add_source(
                Environment::with_prefix(system::ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;

        debug!(
            origin = %origin.display(),
            subscription_buffer_capacity = config.subscription_buffer_capacity,
            retention_window_ms = config.retention_window_ms,
            "Response manager configuration loaded"
        );

        Ok(config)
    }
}
