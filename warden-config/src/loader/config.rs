use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::backend::{BackendConfig, LocalBackendConfig};
use crate::constants::config_files::{
    ENV_MAX_CONCURRENT, ENV_TIMEOUT_SECONDS, ENV_USER_ID, ENV_WORKSPACE_ROOT,
};
use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use crate::security::SecurityConfig;
use crate::workspace::WorkspaceConfig;

/// Root of `warden.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct WardenConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WardenConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backend.validate()?;
        self.workspace.validate()?;
        self.logging.validate()
    }

    pub fn local(&self) -> &LocalBackendConfig {
        match &self.backend {
            BackendConfig::Local(local) => local,
        }
    }

    fn local_mut(&mut self) -> &mut LocalBackendConfig {
        match &mut self.backend {
            BackendConfig::Local(local) => local,
        }
    }

    /// The workspace owner commands run as.
    pub fn user_id(&self) -> &str {
        self.local()
            .user_id
            .as_deref()
            .unwrap_or(&self.workspace.default_user_id)
    }

    /// Apply `WARDEN_*` overrides read through `lookup`.
    ///
    /// Values are applied before validation, so an override that produces an
    /// out-of-range setting is reported by [`Self::validate`] like any other.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |var: &'static str| {
            lookup(var)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        if let Some(user_id) = read(ENV_USER_ID) {
            self.local_mut().user_id = Some(user_id);
        }

        if let Some(root) = read(ENV_WORKSPACE_ROOT) {
            self.workspace.root = PathBuf::from(root);
        }

        if let Some(raw) = read(ENV_TIMEOUT_SECONDS) {
            let seconds = raw.parse::<f64>().map_err(|err| ConfigError::EnvOverride {
                var: ENV_TIMEOUT_SECONDS,
                value: raw.clone(),
                reason: err.to_string(),
            })?;
            self.local_mut().execution.timeout_seconds = seconds;
        }

        if let Some(raw) = read(ENV_MAX_CONCURRENT) {
            let max = raw.parse::<usize>().map_err(|err| ConfigError::EnvOverride {
                var: ENV_MAX_CONCURRENT,
                value: raw.clone(),
                reason: err.to_string(),
            })?;
            self.local_mut().execution.max_concurrent_commands = max;
        }

        Ok(())
    }
}
