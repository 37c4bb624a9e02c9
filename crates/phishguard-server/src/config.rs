//! YAML configuration loading for the inference server.
//!
//! Resolution order for the config file:
//! 1. First CLI argument
//! 2. `PHISHGUARD_CONFIG` environment variable
//! 3. Built-in defaults
//!
//! `PHISHGUARD_WEIGHTS`, when set, overrides `model.weights_path`.

use phishguard_core::ServiceConfig;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "PHISHGUARD_CONFIG";

/// Environment variable overriding the weights path.
pub const WEIGHTS_ENV: &str = "PHISHGUARD_WEIGHTS";

/// Load a [`ServiceConfig`] from a YAML file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn load_config(path: &Path) -> anyhow::Result<ServiceConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
    let config: ServiceConfig = serde_yaml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config YAML: {}", e))?;
    Ok(config)
}

/// Resolve the configuration from CLI args and the environment.
pub fn resolve_config() -> anyhow::Result<ServiceConfig> {
    let config_path: Option<PathBuf> = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .map(PathBuf::from);

    let config = match config_path {
        Some(path) => load_config(&path)?,
        None => ServiceConfig::default(),
    };
    Ok(apply_weights_override(
        config,
        std::env::var(WEIGHTS_ENV).ok(),
    ))
}

/// Replace `model.weights_path` when an override is given.
pub fn apply_weights_override(
    mut config: ServiceConfig,
    weights: Option<String>,
) -> ServiceConfig {
    if let Some(path) = weights.filter(|p| !p.trim().is_empty()) {
        config.model.weights_path = Some(path);
    }
    config
}
