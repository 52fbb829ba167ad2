//! Dummy device settings

use std::path::{Path, PathBuf};

use cari_sim::{ChannelConfig, DeviceConfig};
use serde::{Deserialize, Serialize};

/// Settings file name inside the config directory
const SETTINGS_FILE: &str = "settings.json";

/// Everything the dummy device reads at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Channel endpoints and poll interval
    pub channels: ChannelConfig,
    /// Emulated device description
    pub device: DeviceConfig,
}

impl Settings {
    /// Directory holding the device description read at startup
    ///
    /// `$XDG_CONFIG_HOME/cari-dummy` when that variable is absolute, else
    /// `~/.config/cari-dummy`. `None` only when there is no home directory.
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("cari-dummy"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("cari-dummy"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join(SETTINGS_FILE))
    }

    /// Load settings from the default location
    ///
    /// A missing file gives the stock device. A file that exists but does
    /// not parse is an error, so a typo does not silently start the wrong
    /// device.
    pub fn load() -> anyhow::Result<Self> {
        match Self::settings_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load settings from a specific file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        Self::parse(&json).map_err(|e| anyhow::anyhow!("Invalid {}: {}", path.display(), e))
    }

    fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Save settings to a specific file, creating its directory
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| anyhow::anyhow!("Failed to create settings directory: {}", e))?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| anyhow::anyhow!("Failed to write settings: {}", e))?;

        Ok(())
    }
}
