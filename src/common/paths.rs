use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable that points storyreel at a specific config file.
pub const CONFIG_ENV_VAR: &str = "STORYREEL_CONFIG";

/// Get the main storyreel config directory
pub fn storyreel_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Unable to determine user config directory")?
        .join("storyreel");

    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("creating config directory at {}", config_dir.display()))?;

    Ok(config_dir)
}

/// Resolve the story config file, honouring the override variable.
pub fn story_config_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }
    Ok(storyreel_config_dir()?.join("story.toml"))
}
