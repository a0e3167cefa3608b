use serde::{Deserialize, Serialize};

/// Path-handling policy for file operations inside workspaces.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SecurityConfig {
    /// Reject dot-prefixed file names in addition to the standard checks.
    #[serde(default = "SecurityConfig::default_strict")]
    pub strict_path_validation: bool,
    /// Accept absolute paths as long as they still resolve inside the workspace.
    #[serde(default)]
    pub allow_absolute_paths: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            strict_path_validation: Self::default_strict(),
            allow_absolute_paths: false,
        }
    }
}

impl SecurityConfig {
    const fn default_strict() -> bool {
        true
    }
}
