use anyhow::{anyhow, Result};
use std::fs;
use std::path::PathBuf;

const APP_DIR: &str = "datagrid";

pub struct AppPaths;

impl AppPaths {
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Cannot determine config directory"))?
            .join(APP_DIR);
        Ok(config_dir)
    }

    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn cache_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow!("Cannot determine cache directory"))?
            .join(APP_DIR);

        fs::create_dir_all(&cache_dir)?;
        Ok(cache_dir)
    }

    /// Directory holding one JSON file per browsing session
    pub fn sessions_dir() -> Result<PathBuf> {
        let sessions_dir = Self::cache_dir()?.join("sessions");
        fs::create_dir_all(&sessions_dir)?;
        Ok(sessions_dir)
    }

    pub fn history_file() -> Result<PathBuf> {
        Ok(Self::cache_dir()?.join("history.txt"))
    }
}
