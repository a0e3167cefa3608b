use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Log output settings consumed by the binary's subscriber setup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    /// Emit compact single-line records instead of the full formatter.
    #[serde(default)]
    pub compact: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            compact: false,
        }
    }
}

impl LoggingConfig {
    fn default_level() -> String {
        "warn".to_owned()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.level.trim().to_ascii_lowercase();
        if !LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::invalid(
                "logging.level",
                format!("`{}` is not one of {}", self.level, LEVELS.join(", ")),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_levels_case_insensitively() {
        let config = LoggingConfig {
            level: "DEBUG".to_owned(),
            compact: false,
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_levels() {
        let config = LoggingConfig {
            level: "loud".to_owned(),
            compact: true,
        };
        assert!(config.validate().is_err());
    }
}
