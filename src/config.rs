use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use nanowhale_engine::EngineConfig;

/// Settings loaded from the `--config` TOML file
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub view: ViewConfig,
}

/// Log viewer defaults
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ViewConfig {
    /// Lines kept in the log view before the oldest are dropped
    pub buffer_size: usize,

    /// Start streams with engine timestamps
    pub show_timestamps: bool,

    /// Render timestamps in local time instead of UTC
    pub local_time: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            buffer_size: 10_000,
            show_timestamps: true,
            local_time: true,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&text)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
