//! Config store for loading and saving patchflow.toml.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{PatchflowConfig, PromoteConfigEntry, ServerConfig, parser};

pub const CONFIG_FILE_NAME: &str = "patchflow.toml";

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    /// Store at `<config dir>/patchflow/patchflow.toml`.
    pub fn from_default_location() -> anyhow::Result<Self> {
        let global_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("patchflow");
        Ok(Self::from_path(global_dir.join(CONFIG_FILE_NAME)))
    }

    pub fn from_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn load(&self) -> anyhow::Result<PatchflowConfig> {
        if !self.config_path.exists() {
            return Ok(PatchflowConfig::new());
        }
        parser::parse_config_toml(&self.config_path)
    }

    /// Write a starter config holding `server`.
    ///
    /// Refuses to replace an existing file unless `force` is set.
    pub fn init(&self, server: ServerConfig, force: bool) -> anyhow::Result<PatchflowConfig> {
        if self.config_path.exists() && !force {
            anyhow::bail!(
                "Config file {} already exists. Use --force to overwrite.",
                self.config_path.display()
            );
        }
        let config = PatchflowConfig {
            server,
            ..PatchflowConfig::default()
        };
        self.save(&config)?;
        Ok(config)
    }

    /// Store promotion defaults for `title`. Returns whether the file changed.
    pub fn set_promote(
        &self,
        title: &str,
        entry: PromoteConfigEntry,
        force: bool,
    ) -> anyhow::Result<bool> {
        let mut config = self.load()?;

        let existing = config.promote.get(title);
        if let Some(existing) = existing
            && existing != &entry
            && !force
        {
            anyhow::bail!(
                "Promote settings for '{}' already exist. Use --force to overwrite.",
                title
            );
        }
        if existing == Some(&entry) {
            return Ok(false);
        }

        config.promote.insert(title.to_string(), entry);
        config.validate()?;
        self.save(&config)?;
        Ok(true)
    }

    pub fn save(&self, config: &PatchflowConfig) -> anyhow::Result<()> {
        let content = parser::to_toml(config).context("Failed to serialize config to TOML")?;
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
