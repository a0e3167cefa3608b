//! Caller-facing entry point bundling command execution with workspace file
//! access.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use glob::{MatchOptions, Pattern};
use serde::Serialize;
use tracing::{debug, warn};
use warden_bash_runner::missing_utilities;
use warden_commons::DangerousOperationHandler;
use warden_config::constants::environment::SAFE_PATH;
use warden_config::constants::execution::REQUIRED_UTILITIES;
use warden_config::BackendConfig;

use crate::command_safety::AuditEntry;
use crate::error::{ErrorCode, FileOperation, Result, SandboxError};
use crate::executor::SandboxExecutor;
use crate::path_boundary::PathBoundaryValidator;
use crate::workspace::WorkspaceManager;

const BYTES_PER_MB: u64 = 1024 * 1024;

const LISTING_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
    Symlink,
}

/// One row of [`Sandbox::ls_details`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Path relative to the workspace root.
    pub name: String,
    pub kind: FileKind,
    pub size: u64,
    pub modified: DateTime<Local>,
}

/// A user's sandbox: validated command execution plus file access confined
/// to the user's workspace.
#[derive(Debug)]
pub struct Sandbox {
    executor: SandboxExecutor,
    paths: PathBoundaryValidator,
}

impl Sandbox {
    pub fn new(config: BackendConfig, manager: Arc<WorkspaceManager>) -> Result<Self> {
        let BackendConfig::Local(local) = config;

        if local.execution.validate_utils {
            let missing = missing_utilities(REQUIRED_UTILITIES, SAFE_PATH);
            if !missing.is_empty() {
                return Err(SandboxError::MissingUtilities { missing });
            }
        }

        let paths = manager.path_validator().with_strict(false);
        let executor = SandboxExecutor::new(local, manager)?;
        Ok(Self { executor, paths })
    }

    /// Receive dangerous-pattern rejections through `handler` instead of an
    /// error, while `prevent_dangerous` is enabled.
    pub fn with_handler(mut self, handler: Arc<dyn DangerousOperationHandler>) -> Self {
        self.executor = self.executor.with_handler(handler);
        self
    }

    pub fn user_id(&self) -> &str {
        self.executor.user_id()
    }

    pub fn executor(&self) -> &SandboxExecutor {
        &self.executor
    }

    pub fn workspace(&self) -> Result<PathBuf> {
        self.executor.manager().ensure_workspace(self.user_id())
    }

    pub async fn exec(&self, command: &str) -> Result<String> {
        self.executor.exec(command).await
    }

    pub async fn read(&self, path: &str) -> Result<String> {
        let target = self.resolve(path)?;
        tokio::fs::read_to_string(&target)
            .await
            .map_err(|err| SandboxError::file_operation(FileOperation::Read, path, err))
    }

    /// Write `content` to `path`, creating missing parent directories.
    pub async fn write(&self, path: &str, content: &str) -> Result<()> {
        let limit_mb = self.executor.config().resource_limits.max_file_size_mb;
        let size = u64::try_from(content.len()).unwrap_or(u64::MAX);
        if size > limit_mb.saturating_mul(BYTES_PER_MB) {
            return Err(SandboxError::file_operation(
                FileOperation::Write,
                path,
                format!("content exceeds the {limit_mb} MB file size limit"),
            ));
        }

        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| SandboxError::file_operation(FileOperation::Write, path, err))?;
        }

        tokio::fs::write(&target, content)
            .await
            .map_err(|err| SandboxError::file_operation(FileOperation::Write, path, err))?;
        debug!(path, bytes = size, "Wrote workspace file");
        Ok(())
    }

    /// Sorted workspace-relative names matching `pattern`.
    pub async fn ls(&self, pattern: &str) -> Result<Vec<String>> {
        let matches = self.list_matches(pattern).await?;
        Ok(matches.into_iter().map(|(name, _)| name).collect())
    }

    pub async fn ls_details(&self, pattern: &str) -> Result<Vec<FileEntry>> {
        let matches = self.list_matches(pattern).await?;
        let mut entries = Vec::with_capacity(matches.len());
        for (name, path) in matches {
            let metadata = match tokio::fs::symlink_metadata(&path).await {
                Ok(metadata) => metadata,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Entry vanished while listing");
                    continue;
                }
            };
            let file_type = metadata.file_type();
            let kind = if file_type.is_symlink() {
                FileKind::Symlink
            } else if file_type.is_dir() {
                FileKind::Directory
            } else {
                FileKind::File
            };
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push(FileEntry {
                name,
                kind,
                size: metadata.len(),
                modified: DateTime::<Local>::from(modified),
            });
        }
        Ok(entries)
    }

    /// Every exec decision recorded so far, oldest first.
    pub async fn audit_log(&self) -> Vec<AuditEntry> {
        self.executor.audit_logger().entries().await
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        if path.is_empty() {
            return Err(SandboxError::empty_path());
        }
        let workspace = self.workspace()?;
        self.paths.resolve(&workspace, path)
    }

    async fn list_matches(&self, pattern: &str) -> Result<Vec<(String, PathBuf)>> {
        let pattern = if pattern.trim().is_empty() { "*" } else { pattern };
        if pattern.starts_with('/') {
            return Err(SandboxError::PathViolation {
                code: ErrorCode::AbsolutePathRejected,
                reason: "Absolute patterns are not allowed".to_owned(),
                path: pattern.to_owned(),
            });
        }
        if pattern.contains("..") {
            return Err(SandboxError::PathViolation {
                code: ErrorCode::PathEscapeAttempt,
                reason: "Path traversal sequences are not allowed".to_owned(),
                path: pattern.to_owned(),
            });
        }

        let workspace = self.workspace()?;
        let owned_pattern = pattern.to_owned();
        let mut matches = tokio::task::spawn_blocking(move || glob_workspace(&workspace, &owned_pattern))
            .await
            .map_err(|err| SandboxError::file_operation(FileOperation::List, pattern, err))??;
        matches.sort_by(|left, right| left.0.cmp(&right.0));
        Ok(matches)
    }
}

fn glob_workspace(workspace: &Path, pattern: &str) -> Result<Vec<(String, PathBuf)>> {
    let list_error = |reason: String| SandboxError::file_operation(FileOperation::List, pattern, reason);

    let full_pattern = format!(
        "{}/{pattern}",
        Pattern::escape(&workspace.to_string_lossy())
    );
    let paths = glob::glob_with(&full_pattern, LISTING_OPTIONS)
        .map_err(|err| list_error(format!("invalid pattern: {err}")))?;

    let mut matches = Vec::new();
    for entry in paths {
        let path = match entry {
            Ok(path) => path,
            Err(err) => {
                debug!(error = %err, "Skipping unreadable entry while listing");
                continue;
            }
        };
        let Ok(relative) = path.strip_prefix(workspace) else {
            continue;
        };
        let name = relative.to_string_lossy().into_owned();
        if !name.is_empty() {
            matches.push((name, path));
        }
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use warden_config::{LocalBackendConfig, WorkspaceConfig};

    fn sandbox(temp: &TempDir) -> Sandbox {
        let manager = Arc::new(WorkspaceManager::new(WorkspaceConfig::with_root(temp.path())).unwrap());
        Sandbox::new(
            BackendConfig::Local(LocalBackendConfig::for_user("alice")),
            manager,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn writes_create_parent_directories() {
        let temp = TempDir::new().unwrap();
        let sandbox = sandbox(&temp);

        sandbox.write("notes/2024/todo.md", "- ship").await.unwrap();
        assert_eq!(sandbox.read("notes/2024/todo.md").await.unwrap(), "- ship");
    }

    #[tokio::test]
    async fn dotfiles_stay_writable() {
        let temp = TempDir::new().unwrap();
        let sandbox = sandbox(&temp);

        sandbox.write(".gitignore", "target/\n").await.unwrap();
        assert_eq!(sandbox.read(".gitignore").await.unwrap(), "target/\n");
    }

    #[tokio::test]
    async fn escaping_paths_are_rejected() {
        let temp = TempDir::new().unwrap();
        let sandbox = sandbox(&temp);

        let err = sandbox.read("../outside.txt").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PathEscapeAttempt);

        let err = sandbox.write("/etc/passwd", "x").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AbsolutePathRejected);

        let err = sandbox.read("").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::EmptyPath);
    }

    #[tokio::test]
    async fn missing_files_are_read_failures() {
        let temp = TempDir::new().unwrap();
        let sandbox = sandbox(&temp);

        let err = sandbox.read("missing.txt").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ReadFailed);
        assert!(err.to_string().contains("missing.txt"));
    }

    #[tokio::test]
    async fn oversized_writes_are_refused() {
        let temp = TempDir::new().unwrap();
        let manager = Arc::new(WorkspaceManager::new(WorkspaceConfig::with_root(temp.path())).unwrap());
        let mut config = LocalBackendConfig::for_user("alice");
        config.resource_limits.max_file_size_mb = 1;
        let sandbox = Sandbox::new(BackendConfig::Local(config), manager).unwrap();

        let content = "x".repeat(1024 * 1024 + 1);
        let err = sandbox.write("big.bin", &content).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::WriteFailed);
    }

    #[tokio::test]
    async fn ls_is_sorted_and_skips_hidden_entries() {
        let temp = TempDir::new().unwrap();
        let sandbox = sandbox(&temp);
        sandbox.write("b.txt", "b").await.unwrap();
        sandbox.write("a.txt", "a").await.unwrap();
        sandbox.write("c.log", "c").await.unwrap();
        sandbox.write(".hidden", "h").await.unwrap();

        assert_eq!(sandbox.ls("*").await.unwrap(), vec!["a.txt", "b.txt", "c.log"]);
        assert_eq!(sandbox.ls("*.txt").await.unwrap(), vec!["a.txt", "b.txt"]);
        assert_eq!(sandbox.ls("").await.unwrap(), vec!["a.txt", "b.txt", "c.log"]);
    }

    #[tokio::test]
    async fn nested_patterns_report_relative_names() {
        let temp = TempDir::new().unwrap();
        let sandbox = sandbox(&temp);
        sandbox.write("src/main.rs", "fn main() {}").await.unwrap();
        sandbox.write("src/lib.rs", "").await.unwrap();

        assert_eq!(
            sandbox.ls("src/*.rs").await.unwrap(),
            vec!["src/lib.rs", "src/main.rs"]
        );
    }

    #[tokio::test]
    async fn ls_rejects_escaping_patterns() {
        let temp = TempDir::new().unwrap();
        let sandbox = sandbox(&temp);

        let err = sandbox.ls("../*").await.unwrap_err();
        assert!(matches!(err, SandboxError::PathViolation { .. }));
        let err = sandbox.ls("/etc/*").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AbsolutePathRejected);
    }

    #[tokio::test]
    async fn ls_details_reports_kinds_and_sizes() {
        let temp = TempDir::new().unwrap();
        let sandbox = sandbox(&temp);
        sandbox.write("data/values.csv", "1,2,3").await.unwrap();
        sandbox.write("readme.md", "hello").await.unwrap();

        let entries = sandbox.ls_details("*").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "data");
        assert_eq!(entries[0].kind, FileKind::Directory);
        assert_eq!(entries[1].name, "readme.md");
        assert_eq!(entries[1].kind, FileKind::File);
        assert_eq!(entries[1].size, 5);
    }

    #[test]
    fn missing_utilities_fail_construction_only_when_requested() {
        let temp = TempDir::new().unwrap();
        let manager = Arc::new(WorkspaceManager::new(WorkspaceConfig::with_root(temp.path())).unwrap());
        let mut config = LocalBackendConfig::for_user("alice");
        config.execution.validate_utils = true;

        match Sandbox::new(BackendConfig::Local(config), manager) {
            Ok(_) => {}
            Err(SandboxError::MissingUtilities { missing }) => assert!(!missing.is_empty()),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}
