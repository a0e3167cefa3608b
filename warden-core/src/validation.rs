use serde::Serialize;
use std::fmt;

/// Why a command or path was rejected.
///
/// Command checks use one variant per pipeline stage; the path checks share
/// the remaining variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCategory {
    DangerousPattern,
    PathEscape,
    MalformedQuoting,
    PrivilegedCommand,
    DangerousFlag,
    Structure,
    Obfuscation,
    ResourceHeuristic,
    ShellPipe,
    CommandSubstitution,
    SensitiveRedirect,
    InvalidPath,
    AbsolutePath,
    BlockedFile,
    SymlinkEscape,
    HiddenFile,
}

impl ViolationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DangerousPattern => "dangerous_pattern",
            Self::PathEscape => "path_escape",
            Self::MalformedQuoting => "malformed_quoting",
            Self::PrivilegedCommand => "privileged_command",
            Self::DangerousFlag => "dangerous_flag",
            Self::Structure => "structure",
            Self::Obfuscation => "obfuscation",
            Self::ResourceHeuristic => "resource_heuristic",
            Self::ShellPipe => "shell_pipe",
            Self::CommandSubstitution => "command_substitution",
            Self::SensitiveRedirect => "sensitive_redirect",
            Self::InvalidPath => "invalid_path",
            Self::AbsolutePath => "absolute_path",
            Self::BlockedFile => "blocked_file",
            Self::SymlinkEscape => "symlink_escape",
            Self::HiddenFile => "hidden_file",
        }
    }
}

impl fmt::Display for ViolationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a safety check. A reason exists only for unsafe results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Safe,
    Unsafe {
        category: ViolationCategory,
        reason: String,
    },
}

impl ValidationResult {
    pub fn unsafe_because(category: ViolationCategory, reason: impl Into<String>) -> Self {
        Self::Unsafe {
            category,
            reason: reason.into(),
        }
    }

    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Safe)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Safe => None,
            Self::Unsafe { reason, .. } => Some(reason),
        }
    }

    pub fn category(&self) -> Option<ViolationCategory> {
        match self {
            Self::Safe => None,
            Self::Unsafe { category, .. } => Some(*category),
        }
    }
}
