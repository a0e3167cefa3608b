use serde::{Deserialize, Serialize};

use crate::constants::resources::{
    DEFAULT_MAX_CPU_PERCENT, DEFAULT_MAX_FILE_SIZE_MB, DEFAULT_MAX_MEMORY_MB,
    DEFAULT_MAX_OPEN_FILES, DEFAULT_MAX_PROCESSES,
};
use crate::error::ConfigError;

/// Per-command resource ceilings enforced by the watchdog.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ResourceLimits {
    /// Resident memory of the command's root process, in megabytes.
    #[serde(default = "ResourceLimits::default_max_memory_mb")]
    pub max_memory_mb: u64,
    /// CPU usage of the command's root process, as a percentage of one core.
    #[serde(default = "ResourceLimits::default_max_cpu_percent")]
    pub max_cpu_percent: f32,
    /// Number of live descendant processes.
    #[serde(default = "ResourceLimits::default_max_processes")]
    pub max_processes: usize,
    /// Largest file a command may leave in the workspace, in megabytes.
    #[serde(default = "ResourceLimits::default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    /// Open file descriptors held by the command's root process.
    #[serde(default = "ResourceLimits::default_max_open_files")]
    pub max_open_files: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_memory_mb: Self::default_max_memory_mb(),
            max_cpu_percent: Self::default_max_cpu_percent(),
            max_processes: Self::default_max_processes(),
            max_file_size_mb: Self::default_max_file_size_mb(),
            max_open_files: Self::default_max_open_files(),
        }
    }
}

impl ResourceLimits {
    const fn default_max_memory_mb() -> u64 {
        DEFAULT_MAX_MEMORY_MB
    }

    const fn default_max_cpu_percent() -> f32 {
        DEFAULT_MAX_CPU_PERCENT
    }

    const fn default_max_processes() -> usize {
        DEFAULT_MAX_PROCESSES
    }

    const fn default_max_file_size_mb() -> u64 {
        DEFAULT_MAX_FILE_SIZE_MB
    }

    const fn default_max_open_files() -> usize {
        DEFAULT_MAX_OPEN_FILES
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_memory_mb == 0 {
            return Err(ConfigError::invalid(
                "resource_limits.max_memory_mb",
                "must be greater than 0",
            ));
        }
        if !(self.max_cpu_percent > 0.0 && self.max_cpu_percent <= 100.0) {
            return Err(ConfigError::invalid(
                "resource_limits.max_cpu_percent",
                format!("must be in (0, 100], got {}", self.max_cpu_percent),
            ));
        }
        if self.max_processes == 0 {
            return Err(ConfigError::invalid(
                "resource_limits.max_processes",
                "must be greater than 0",
            ));
        }
        if self.max_open_files == 0 {
            return Err(ConfigError::invalid(
                "resource_limits.max_open_files",
                "must be greater than 0",
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
        let limits = ResourceLimits::default();
        assert_eq!(limits.max_memory_mb, 1024);
        assert_eq!(limits.max_processes, 50);
        assert_eq!(limits.max_file_size_mb, 100);
        assert_eq!(limits.max_open_files, 1000);
        limits.validate().unwrap();
    }

    #[test]
    fn cpu_percent_must_be_a_percentage() {
        let mut limits = ResourceLimits {
            max_cpu_percent: 0.0,
            ..ResourceLimits::default()
        };
        assert!(limits.validate().is_err());
        limits.max_cpu_percent = 100.1;
        assert!(limits.validate().is_err());
        limits.max_cpu_percent = 100.0;
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn zero_memory_is_rejected() {
        let limits = ResourceLimits {
            max_memory_mb: 0,
            ..ResourceLimits::default()
        };
        assert!(limits.validate().is_err());
    }

    #[test]
    fn partial_tables_fill_defaults() {
        let limits: ResourceLimits = toml::from_str("max_memory_mb = 256").unwrap();
        assert_eq!(limits.max_memory_mb, 256);
        assert_eq!(limits.max_processes, 50);
    }
}
