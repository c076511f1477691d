//! File-based configuration loading for the Linux host.

use std::path::{Path, PathBuf};

use tracing::info;

use envnode_core::{AgentConfig, ConfigError};

/// Environment variable holding the path of the JSON configuration file.
pub const CONFIG_ENV_VAR: &str = "ENVNODE_CONFIG";

/// Path from [`CONFIG_ENV_VAR`], if set and non-empty.
pub fn config_path_from_env() -> Option<PathBuf> {
    std::env::var_os(CONFIG_ENV_VAR)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Load the agent configuration from `path`, or fall back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<AgentConfig, ConfigError> {
    let Some(path) = path else {
        info!("no configuration file given, using defaults");
        return Ok(AgentConfig::default());
    };

    let text = std::fs::read_to_string(path)?;
    let config = AgentConfig::from_json(&text)?;
    info!(path = %path.display(), device_id = %config.device_id, "configuration loaded");
    Ok(config)
}
