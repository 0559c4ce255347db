//! Bootstrap configuration file resolution
//!
//! Locates the TOML bootstrap file shared by the chorus services.
//! Priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`<config dir>/chorus/config.toml`)

use crate::{Error, Result};
use std::path::PathBuf;

/// Resolve the bootstrap config file path, if any exists.
///
/// Returns `Ok(None)` when no file was specified and none exists at the
/// platform default location; callers fall back to built-in defaults.
pub fn resolve_config_file(cli_arg: Option<&str>, env_var_name: &str) -> Result<Option<PathBuf>> {
    // Priority 1: command-line argument. An explicitly named file must exist.
    if let Some(path) = cli_arg {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return Ok(Some(path));
    }

    // Priority 2: environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return Ok(Some(path));
    }

    // Priority 3: platform config directory
    if let Some(dir) = dirs::config_dir() {
        let path = dir.join("chorus").join("config.toml");
        if path.exists() {
            return Ok(Some(path));
        }
    }

    Ok(None)
}
