/// Command execution limits and defaults
pub mod execution {
    pub const DEFAULT_TIMEOUT_SECS: f64 = 300.0;
    pub const MAX_TIMEOUT_SECS: f64 = 3600.0;
    pub const DEFAULT_MAX_CONCURRENT_COMMANDS: usize = 10;
    pub const MAX_CONCURRENT_COMMANDS: usize = 100;
    pub const MAX_OUTPUT_LENGTH: usize = 10_000_000;
    /// Characters reserved for the truncation notice appended to long output.
    pub const TRUNCATION_RESERVE: usize = 50;
    /// Utilities that must resolve on the sandbox PATH when utility validation is on.
    pub const REQUIRED_UTILITIES: &[&str] =
        &["ls", "find", "grep", "cat", "wc", "head", "tail", "sort"];
    /// Audit entries kept per sandbox; the oldest are dropped first.
    pub const MAX_AUDIT_ENTRIES: usize = 10_000;
}

/// Environment handed to sandboxed children
pub mod environment {
    pub const SAFE_PATH: &str = "/usr/local/bin:/usr/bin:/bin";
    pub const SAFE_LOCALE: &str = "C";
    pub const FALLBACK_USER: &str = "warden";
}

/// Resource monitoring defaults and host thresholds
pub mod resources {
    pub const DEFAULT_MAX_MEMORY_MB: u64 = 1024;
    pub const DEFAULT_MAX_CPU_PERCENT: f32 = 80.0;
    pub const DEFAULT_MAX_PROCESSES: usize = 50;
    pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 100;
    pub const DEFAULT_MAX_OPEN_FILES: usize = 1000;

    pub const SYSTEM_MEMORY_WARN_PERCENT: f32 = 90.0;
    pub const SYSTEM_CPU_WARN_PERCENT: f32 = 95.0;
    pub const SYSTEM_DISK_WARN_PERCENT: f32 = 95.0;

    pub const WATCHDOG_POLL_INTERVAL_MS: u64 = 250;
    /// A process must stay above its CPU limit this long before it is killed.
    pub const CPU_BREACH_GRACE_SECS: u64 = 30;
}

/// Workspace layout
pub mod workspace {
    pub const DEFAULT_ROOT_DIR_NAME: &str = "warden";
    pub const USERS_DIR: &str = "users";
    pub const TMP_DIR: &str = ".tmp";
    pub const TEMP_PREFIX: &str = "warden_";
    pub const DEFAULT_USER_ID: &str = "default-user";
    pub const DEFAULT_PERMISSIONS: u32 = 0o700;
    pub const MAX_USER_ID_LENGTH: usize = 64;
    pub const RESERVED_USER_IDS: &[&str] = &[
        "root",
        "admin",
        "system",
        "daemon",
        "bin",
        "sys",
        "tmp",
        "temp",
        "null",
        "undefined",
        "default",
        "guest",
        "anonymous",
    ];
}

/// Configuration file discovery and environment overrides
pub mod config_files {
    pub const CONFIG_FILE_NAME: &str = "warden.toml";
    pub const HOME_CONFIG_DIR: &str = ".warden";

    pub const ENV_CONFIG_PATH: &str = "WARDEN_CONFIG_PATH";
    pub const ENV_USER_ID: &str = "WARDEN_USER_ID";
    pub const ENV_WORKSPACE_ROOT: &str = "WARDEN_WORKSPACE_ROOT";
    pub const ENV_TIMEOUT_SECONDS: &str = "WARDEN_TIMEOUT_SECONDS";
    pub const ENV_MAX_CONCURRENT: &str = "WARDEN_MAX_CONCURRENT";
}
