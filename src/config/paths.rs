//! XDG path resolution for ember configuration and cache directories.

use anyhow::Result;
use std::path::PathBuf;

use super::types::Config;
use crate::constants::{APP_NAME, CONFIG_FILENAME, HISTORY_FILENAME};

impl Config {
    /// Returns `~/.config/ember/` on Linux (`XDG_CONFIG_HOME/ember`).
    ///
    /// # Errors
    ///
    /// Returns an error if the platform's config directory cannot be determined.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join(APP_NAME);
        Ok(dir)
    }

    /// Returns `~/.cache/ember/` on Linux (`XDG_CACHE_HOME/ember`).
    /// Holds readline history and log files.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform's cache directory cannot be determined.
    pub fn cache_dir() -> Result<PathBuf> {
        let dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory"))?
            .join(APP_NAME);
        Ok(dir)
    }

    /// Returns `~/.config/ember/config.toml` on Linux.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    pub fn history_path() -> Result<PathBuf> {
        Ok(Self::cache_dir()?.join(HISTORY_FILENAME))
    }

    pub fn log_dir() -> Result<PathBuf> {
        Ok(Self::cache_dir()?.join("logs"))
    }
}
