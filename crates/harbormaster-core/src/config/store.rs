//! Config store for loading and saving harbormaster.toml.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{EngineConfig, parser};

pub const CONFIG_FILE_NAME: &str = "harbormaster.toml";

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    /// `<user config dir>/harbormaster/harbormaster.toml`.
    pub fn from_default_dir() -> anyhow::Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("harbormaster");
        Ok(Self::from_path(dir.join(CONFIG_FILE_NAME)))
    }

    pub fn from_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// A missing file yields the default configuration.
    pub fn load(&self) -> anyhow::Result<EngineConfig> {
        if !self.config_path.exists() {
            return Ok(EngineConfig::new());
        }
        parser::parse_config(&self.config_path)
    }

    pub fn save(&self, config: &EngineConfig) -> anyhow::Result<()> {
        let content = parser::to_toml(config)?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(&self.config_path, content).with_context(|| {
            format!(
                "Failed to write config file: {}",
                self.config_path.display()
            )
        })?;
        Ok(())
    }
}
