//! Sandboxed shell execution for semi-trusted agents.
//!
//! A [`Sandbox`] confines one user to a private workspace directory. Every
//! command is screened by [`CommandSafetyValidator`] before it runs, then
//! executed through the bash runner with a scrubbed environment, a deadline,
//! a concurrency cap and a [`ResourceMonitor`] watchdog. File reads, writes
//! and listings go through [`PathBoundaryValidator`] and never leave the
//! workspace.
//!
//! ```no_run
//! use std::sync::Arc;
//! use warden_config::{BackendConfig, LocalBackendConfig, WorkspaceConfig};
//! use warden_core::{Sandbox, WorkspaceManager};
//!
//! # async fn demo() -> warden_core::Result<()> {
//! let manager = Arc::new(WorkspaceManager::new(WorkspaceConfig::default())?);
//! let sandbox = Sandbox::new(
//!     BackendConfig::Local(LocalBackendConfig::for_user("alice")),
//!     manager,
//! )?;
//! sandbox.write("hello.txt", "hi").await?;
//! assert_eq!(sandbox.exec("cat hello.txt").await?, "hi");
//! # Ok(())
//! # }
//! ```

pub mod command_safety;
pub mod error;
pub mod executor;
pub mod path_boundary;
pub mod resource_monitor;
pub mod sandbox;
pub mod validation;
pub mod workspace;

pub use command_safety::{
    is_dangerous_operation, validate_command, AuditEntry, CommandSafetyValidator,
    SafetyAuditLogger,
};
pub use error::{ErrorCode, FileOperation, Result, SandboxError};
pub use executor::SandboxExecutor;
pub use path_boundary::PathBoundaryValidator;
pub use resource_monitor::{ProcessSample, ProcessVerdict, ResourceMonitor};
pub use sandbox::{FileEntry, FileKind, Sandbox};
pub use validation::{ValidationResult, ViolationCategory};
pub use workspace::{
    validate_user_id, TemporaryWorkspace, WorkspaceInfo, WorkspaceManager, WorkspaceState,
    WorkspaceStats,
};

pub use warden_commons::{DangerousOperationHandler, NoopHandler};
