//! Path resolution utilities.

use crate::env;
use crate::error::ConfigError;
use std::path::PathBuf;

/// Get the Keeper base directory (`$KEEPER_HOME`, else `~/.keeper`).
pub fn base_dir() -> Result<PathBuf, ConfigError> {
    if let Some(home) = env::get_var(env::vars::KEEPER_HOME) {
        return Ok(expand_tilde(&home));
    }
    let home = dirs::home_dir().ok_or_else(|| {
        ConfigError::Validation("Could not determine home directory".to_string())
    })?;
    Ok(home.join(".keeper"))
}

/// Get the main config file path (`~/.keeper/keeper.json5`).
pub fn config_file() -> Result<PathBuf, ConfigError> {
    if let Some(path) = env::get_var(env::vars::KEEPER_CONFIG) {
        return Ok(expand_tilde(&path));
    }
    Ok(base_dir()?.join("keeper.json5"))
}

/// Get the default local vault path (`~/.keeper/vault.bin`).
pub fn default_vault_file() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("vault.bin"))
}

/// Get the default download directory (`~/.keeper/downloads`).
pub fn downloads_dir() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("downloads"))
}

/// Expand tilde (~) in a path.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
