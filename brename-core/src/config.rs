use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Engine configuration, loaded once at session start and passed into the
/// components that need it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory where revert scripts and the "latest" pointer are stored
    #[serde(default = "default_revert_dir")]
    pub revert_dir: PathBuf,

    /// Whether to record a revert script for every executed batch
    #[serde(default)]
    pub allow_revert: bool,

    /// Quick-insert macro list offered by interactive front ends
    #[serde(default = "default_macros")]
    pub macros: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            revert_dir: default_revert_dir(),
            allow_revert: false,
            macros: default_macros(),
        }
    }
}

fn default_revert_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".revert-renames")
}

fn default_macros() -> Vec<String> {
    [
        "%0n",
        "%00n",
        "%000n",
        "%Y-%m-%d",
        "%Y-%m-%d-%H_%M_%S",
        "%Y-%m-%d %H_%M_%S",
    ]
    .map(String::from)
    .to_vec()
}

impl Config {
    /// Load config from the user config directory if it exists
    pub fn load() -> Result<Self> {
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("brename").join("config.toml");
            if config_path.exists() {
                return Self::load_from_path(&config_path);
            }
        }

        Ok(Self::default())
    }

    /// Load config from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to a specific path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
