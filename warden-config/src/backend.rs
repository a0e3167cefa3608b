use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ConfigError;
use crate::execution::ExecutionConfig;
use crate::resource_limits::ResourceLimits;

/// Execution backends understood by the sandbox.
///
/// The set is closed: configurations naming any other `type` fail to
/// deserialize, and [`BackendKind::from_str`] reports
/// [`ConfigError::UnknownBackend`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    Local(LocalBackendConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Local(LocalBackendConfig::default())
    }
}

impl BackendConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Local(_) => BackendKind::Local,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Local(local) => local.validate(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Local,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            _ => Err(ConfigError::UnknownBackend(value.to_owned())),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
        }
    }
}

/// Settings for running commands on the local host.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LocalBackendConfig {
    /// Workspace owner. Falls back to `workspace.default_user_id` when unset.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub resource_limits: ResourceLimits,
}

impl LocalBackendConfig {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(user_id) = &self.user_id {
            if user_id.trim().is_empty() {
                return Err(ConfigError::invalid(
                    "backend.user_id",
                    "must not be empty when set",
                ));
            }
        }
        self.execution.validate()?;
        self.resource_limits.validate()
    }
}
