//! Error types surfaced by the sandbox.
//!
//! Every [`SandboxError`] maps to a stable [`ErrorCode`] so callers can branch
//! on the failure class without matching message text.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use warden_config::ConfigError;

/// Stable, machine-readable identifier for a [`SandboxError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    EmptyCommand,
    EmptyPath,
    DangerousOperation,
    AbsolutePathRejected,
    PathEscapeAttempt,
    ExecFailed,
    ExecTimeout,
    ResourceLimitExceeded,
    WorkspaceError,
    InvalidUserId,
    ReadFailed,
    WriteFailed,
    LsFailed,
    InvalidConfig,
    MissingUtilities,
    ExecError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyCommand => "EMPTY_COMMAND",
            Self::EmptyPath => "EMPTY_PATH",
            Self::DangerousOperation => "DANGEROUS_OPERATION",
            Self::AbsolutePathRejected => "ABSOLUTE_PATH_REJECTED",
            Self::PathEscapeAttempt => "PATH_ESCAPE_ATTEMPT",
            Self::ExecFailed => "EXEC_FAILED",
            Self::ExecTimeout => "EXEC_TIMEOUT",
            Self::ResourceLimitExceeded => "RESOURCE_LIMIT_EXCEEDED",
            Self::WorkspaceError => "WORKSPACE_ERROR",
            Self::InvalidUserId => "INVALID_USER_ID",
            Self::ReadFailed => "READ_FAILED",
            Self::WriteFailed => "WRITE_FAILED",
            Self::LsFailed => "LS_FAILED",
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::MissingUtilities => "MISSING_UTILITIES",
            Self::ExecError => "EXEC_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which file operation a [`SandboxError::FileOperation`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Read,
    Write,
    List,
}

impl fmt::Display for FileOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::List => "list",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum SandboxError {
    /// The caller supplied an empty command or path.
    #[error("{message}")]
    Usage { code: ErrorCode, message: String },

    #[error("Command blocked: {reason} (command: {command})")]
    SafetyViolation { reason: String, command: String },

    #[error("{reason}: {path}")]
    PathViolation {
        code: ErrorCode,
        reason: String,
        path: String,
    },

    /// The command ran and exited non-zero.
    #[error("{message}")]
    ExecutionFailure {
        exit_code: Option<i32>,
        message: String,
        command: String,
    },

    #[error("Command timed out after {:.1}s: {command}", timeout.as_secs_f64())]
    Timeout { command: String, timeout: Duration },

    #[error("{reason} (command: {command})")]
    ResourceLimitExceeded { reason: String, command: String },

    #[error("Workspace error for '{user_id}': {message}")]
    Workspace { user_id: String, message: String },

    #[error("Invalid user id '{user_id}': {reason}")]
    InvalidUserId { user_id: String, reason: String },

    #[error("Failed to {operation} '{}': {reason}", path.display())]
    FileOperation {
        operation: FileOperation,
        path: PathBuf,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Required utilities not found on the sandbox PATH: {}", missing.join(", "))]
    MissingUtilities { missing: Vec<String> },

    #[error("Failed to start command '{command}': {source:#}")]
    Spawn {
        command: String,
        #[source]
        source: anyhow::Error,
    },
}

impl SandboxError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Usage { code, .. } | Self::PathViolation { code, .. } => *code,
            Self::SafetyViolation { .. } => ErrorCode::DangerousOperation,
            Self::ExecutionFailure { .. } => ErrorCode::ExecFailed,
            Self::Timeout { .. } => ErrorCode::ExecTimeout,
            Self::ResourceLimitExceeded { .. } => ErrorCode::ResourceLimitExceeded,
            Self::Workspace { .. } => ErrorCode::WorkspaceError,
            Self::InvalidUserId { .. } => ErrorCode::InvalidUserId,
            Self::FileOperation { operation, .. } => match operation {
                FileOperation::Read => ErrorCode::ReadFailed,
                FileOperation::Write => ErrorCode::WriteFailed,
                FileOperation::List => ErrorCode::LsFailed,
            },
            Self::Config(_) => ErrorCode::InvalidConfig,
            Self::MissingUtilities { .. } => ErrorCode::MissingUtilities,
            Self::Spawn { .. } => ErrorCode::ExecError,
        }
    }

    pub(crate) fn empty_command() -> Self {
        Self::Usage {
            code: ErrorCode::EmptyCommand,
            message: "Command cannot be empty".to_owned(),
        }
    }

    pub(crate) fn empty_path() -> Self {
        Self::Usage {
            code: ErrorCode::EmptyPath,
            message: "Path cannot be empty".to_owned(),
        }
    }

    pub(crate) fn workspace(user_id: &str, message: impl Into<String>) -> Self {
        Self::Workspace {
            user_id: user_id.to_owned(),
            message: message.into(),
        }
    }

    pub(crate) fn file_operation(
        operation: FileOperation,
        path: impl Into<PathBuf>,
        reason: impl fmt::Display,
    ) -> Self {
        Self::FileOperation {
            operation,
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = SandboxError> = std::result::Result<T, E>;
