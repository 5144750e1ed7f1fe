//! YAML configuration loading for the detection engine.
//!
//! Loads an [`EngineConfig`] from a YAML file on disk. Every field is
//! optional and falls back to its documented default, so an empty file (or
//! no file at all, via [`EngineConfig::default`]) yields the stock engine.

use std::path::Path;

use promptshield_core::{EngineConfig, PromptShieldError, Result};

/// Load and validate an [`EngineConfig`] from a YAML file at `path`.
///
/// # Errors
///
/// Returns a configuration error if the file cannot be read, the YAML is
/// invalid, or validation fails; the engine must not start on a
/// partially-valid configuration.
pub fn load_engine_config(path: &Path) -> Result<EngineConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        PromptShieldError::Config(format!("failed to read config file {}: {e}", path.display()))
    })?;
    let config: EngineConfig = serde_yaml::from_str(&contents)
        .map_err(|e| PromptShieldError::Config(format!("failed to parse config YAML: {e}")))?;
    config.validate()?;
    Ok(config)
}
