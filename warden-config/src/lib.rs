//! Configuration for the warden sandbox.
//!
//! Every section is a plain serde struct with explicit defaults, validated
//! once after loading and treated as immutable afterwards. [`ConfigManager`]
//! layers `~/.warden/warden.toml` under the workspace's `warden.toml` (or a
//! file named by `WARDEN_CONFIG_PATH`) and then applies `WARDEN_*`
//! environment overrides.

pub mod backend;
pub mod constants;
pub mod error;
pub mod execution;
pub mod loader;
pub mod logging;
pub mod resource_limits;
pub mod security;
pub mod workspace;

pub use backend::{BackendConfig, BackendKind, LocalBackendConfig};
pub use error::ConfigError;
pub use execution::{ExecutionConfig, ShellPreference};
pub use loader::{ConfigManager, WardenConfig};
pub use logging::LoggingConfig;
pub use resource_limits::ResourceLimits;
pub use security::SecurityConfig;
pub use workspace::WorkspaceConfig;
