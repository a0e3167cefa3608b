use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::execution::{
    DEFAULT_MAX_CONCURRENT_COMMANDS, DEFAULT_TIMEOUT_SECS, MAX_CONCURRENT_COMMANDS,
    MAX_OUTPUT_LENGTH, MAX_TIMEOUT_SECS,
};
use crate::error::ConfigError;

/// Which shell interprets sandboxed commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellPreference {
    Bash,
    Sh,
    /// Prefer bash when it is installed, otherwise fall back to sh.
    #[default]
    Auto,
}

impl std::fmt::Display for ShellPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Bash => "bash",
            Self::Sh => "sh",
            Self::Auto => "auto",
        };
        f.write_str(label)
    }
}

/// Execution policy for a single backend.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub shell: ShellPreference,
    /// Downgrade dangerous-pattern rejections to a callback plus empty output
    /// when a handler is attached.
    #[serde(default = "ExecutionConfig::default_true")]
    pub prevent_dangerous: bool,
    /// Check that the core POSIX utilities resolve before accepting commands.
    #[serde(default)]
    pub validate_utils: bool,
    /// Wall-clock limit per command, in seconds.
    #[serde(default = "ExecutionConfig::default_timeout_seconds")]
    pub timeout_seconds: f64,
    #[serde(default = "ExecutionConfig::default_max_concurrent_commands")]
    pub max_concurrent_commands: usize,
    /// Truncate stdout beyond this many characters. Unlimited when absent.
    #[serde(default)]
    pub max_output_length: Option<usize>,
    /// Record every exec decision in the audit trail.
    #[serde(default = "ExecutionConfig::default_true")]
    pub audit_commands: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            shell: ShellPreference::default(),
            prevent_dangerous: true,
            validate_utils: false,
            timeout_seconds: Self::default_timeout_seconds(),
            max_concurrent_commands: Self::default_max_concurrent_commands(),
            max_output_length: None,
            audit_commands: true,
        }
    }
}

impl ExecutionConfig {
    const fn default_true() -> bool {
        true
    }

    const fn default_timeout_seconds() -> f64 {
        DEFAULT_TIMEOUT_SECS
    }

    const fn default_max_concurrent_commands() -> usize {
        DEFAULT_MAX_CONCURRENT_COMMANDS
    }

    /// Timeout as a [`Duration`]. Only meaningful after [`Self::validate`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.timeout_seconds > 0.0 && self.timeout_seconds <= MAX_TIMEOUT_SECS) {
            return Err(ConfigError::invalid(
                "timeout_seconds",
                format!(
                    "must be greater than 0 and at most {MAX_TIMEOUT_SECS}, got {}",
                    self.timeout_seconds
                ),
            ));
        }

        if !(1..=MAX_CONCURRENT_COMMANDS).contains(&self.max_concurrent_commands) {
            return Err(ConfigError::invalid(
                "max_concurrent_commands",
                format!(
                    "must be between 1 and {MAX_CONCURRENT_COMMANDS}, got {}",
                    self.max_concurrent_commands
                ),
            ));
        }

        if let Some(max) = self.max_output_length {
            if !(1..=MAX_OUTPUT_LENGTH).contains(&max) {
                return Err(ConfigError::invalid(
                    "max_output_length",
                    format!("must be between 1 and {MAX_OUTPUT_LENGTH}, got {max}"),
                ));
            }
        }

        Ok(())
    }
}
