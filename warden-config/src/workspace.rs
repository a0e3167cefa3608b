use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::workspace::{DEFAULT_PERMISSIONS, DEFAULT_ROOT_DIR_NAME, DEFAULT_USER_ID};
use crate::error::ConfigError;

/// Where per-user workspaces live and how they are looked after.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkspaceConfig {
    /// Directory holding `users/<id>` workspaces.
    #[serde(default = "WorkspaceConfig::default_root")]
    pub root: PathBuf,
    #[serde(default = "WorkspaceConfig::default_user_id")]
    pub default_user_id: String,
    /// Reject workspaces that grow beyond this many megabytes.
    #[serde(default)]
    pub max_workspace_size_mb: Option<u64>,
    /// Remove temporary workspaces when the manager is dropped.
    #[serde(default = "WorkspaceConfig::default_cleanup_on_exit")]
    pub cleanup_on_exit: bool,
    /// Unix mode applied to every workspace directory.
    #[serde(default = "WorkspaceConfig::default_permissions")]
    pub permissions: u32,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: Self::default_root(),
            default_user_id: Self::default_user_id(),
            max_workspace_size_mb: None,
            cleanup_on_exit: Self::default_cleanup_on_exit(),
            permissions: Self::default_permissions(),
        }
    }
}

impl WorkspaceConfig {
    /// Configuration rooted at an explicit directory, all else default.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    fn default_root() -> PathBuf {
        std::env::temp_dir().join(DEFAULT_ROOT_DIR_NAME)
    }

    fn default_user_id() -> String {
        DEFAULT_USER_ID.to_owned()
    }

    const fn default_cleanup_on_exit() -> bool {
        true
    }

    const fn default_permissions() -> u32 {
        DEFAULT_PERMISSIONS
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root.as_os_str().is_empty() {
            return Err(ConfigError::invalid("workspace.root", "must not be empty"));
        }
        if self.default_user_id.trim().is_empty() {
            return Err(ConfigError::invalid(
                "workspace.default_user_id",
                "must not be empty",
            ));
        }
        if self.max_workspace_size_mb == Some(0) {
            return Err(ConfigError::invalid(
                "workspace.max_workspace_size_mb",
                "must be greater than 0 when set",
            ));
        }
        if self.permissions > 0o777 {
            return Err(ConfigError::invalid(
                "workspace.permissions",
                format!("{:o} is not a valid permission mode", self.permissions),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_safe() {
        let config = WorkspaceConfig::default();
        assert!(config.root.ends_with("warden"));
        assert_eq!(config.default_user_id, "default-user");
        assert!(config.cleanup_on_exit);
        assert_eq!(config.permissions, 0o700);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_bad_permissions() {
        let config = WorkspaceConfig {
            permissions: 0o7777,
            ..WorkspaceConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
