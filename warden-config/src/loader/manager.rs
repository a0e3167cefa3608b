use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::constants::config_files::{CONFIG_FILE_NAME, ENV_CONFIG_PATH, HOME_CONFIG_DIR};
use crate::loader::config::WardenConfig;
use crate::loader::layers::{ConfigLayerEntry, ConfigLayerSource, ConfigLayerStack};

/// Configuration manager for loading and validating configurations
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: WardenConfig,
    config_path: Option<PathBuf>,
    layer_stack: ConfigLayerStack,
}

impl ConfigManager {
    /// Load configuration from the default locations
    pub fn load() -> Result<Self> {
        if let Ok(config_path) = std::env::var(ENV_CONFIG_PATH) {
            let trimmed = config_path.trim();
            if !trimmed.is_empty() {
                return Self::load_from_file(trimmed).with_context(|| {
                    format!("Failed to load configuration from {ENV_CONFIG_PATH}={trimmed}")
                });
            }
        }

        Self::load_from_workspace(std::env::current_dir()?)
    }

    /// Load configuration for a working directory: the user's home layer
    /// followed by `warden.toml` in `workspace`.
    pub fn load_from_workspace(workspace: impl AsRef<Path>) -> Result<Self> {
        let workspace = workspace.as_ref();
        let mut layer_stack = Self::user_layers();

        let workspace_config_path = workspace.join(CONFIG_FILE_NAME);
        if workspace_config_path.exists() {
            let toml = Self::load_toml_from_file(&workspace_config_path)?;
            layer_stack.push(ConfigLayerEntry::new(
                ConfigLayerSource::Workspace {
                    file: workspace_config_path,
                },
                toml,
            ));
        }

        Self::finish(layer_stack)
    }

    /// Load configuration from a specific file layered over the user's home
    /// configuration.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut layer_stack = Self::user_layers();

        let toml = Self::load_toml_from_file(path)?;
        layer_stack.push(ConfigLayerEntry::new(
            ConfigLayerSource::Workspace {
                file: path.to_path_buf(),
            },
            toml,
        ));

        Self::finish(layer_stack)
            .with_context(|| format!("Failed to load config file: {}", path.display()))
    }

    fn user_layers() -> ConfigLayerStack {
        let mut layer_stack = ConfigLayerStack::default();
        let Some(home) = dirs::home_dir() else {
            return layer_stack;
        };

        let home_config_path = home.join(HOME_CONFIG_DIR).join(CONFIG_FILE_NAME);
        if home_config_path.exists() {
            match Self::load_toml_from_file(&home_config_path) {
                Ok(toml) => layer_stack.push(ConfigLayerEntry::new(
                    ConfigLayerSource::User {
                        file: home_config_path,
                    },
                    toml,
                )),
                Err(err) => debug!(error = %err, "Skipping unreadable user configuration"),
            }
        }

        layer_stack
    }

    fn finish(layer_stack: ConfigLayerStack) -> Result<Self> {
        let mut config: WardenConfig = if layer_stack.layers().is_empty() {
            WardenConfig::default()
        } else {
            layer_stack
                .effective_config()
                .try_into()
                .context("Failed to deserialize effective configuration")?
        };

        config
            .apply_env_overrides(|var| std::env::var(var).ok())
            .context("Failed to apply environment overrides")?;
        config
            .validate()
            .context("Configuration failed validation")?;

        let config_path = layer_stack
            .layers()
            .last()
            .map(|layer| layer.source.file().clone());

        Ok(Self {
            config,
            config_path,
            layer_stack,
        })
    }

    fn load_toml_from_file(path: &Path) -> Result<toml::Value> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let value: toml::Value = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(value)
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    /// Consume the manager and keep only the configuration
    pub fn into_config(self) -> WardenConfig {
        self.config
    }

    /// Path of the highest-precedence layer, if any file was loaded
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn layer_stack(&self) -> &ConfigLayerStack {
        &self.layer_stack
    }
}
