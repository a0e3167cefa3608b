//! Workspace boundary checks for caller-supplied paths.
//!
//! A candidate is accepted only if it names something inside the workspace
//! root after every symlink has been resolved. The textual checks run first
//! so that obviously hostile input never touches the filesystem.

mod blocklist;

use std::path::{Component, Path, PathBuf};

use tracing::debug;
use warden_commons::canonicalize_allow_missing;

use crate::error::{ErrorCode, SandboxError};
use crate::validation::{ValidationResult, ViolationCategory};

pub use blocklist::blocked_reason;

const MAX_PATH_LENGTH: usize = 4096;
const MAX_PATH_DEPTH: usize = 32;

#[derive(Debug)]
struct Violation {
    category: ViolationCategory,
    reason: String,
}

impl Violation {
    fn new(category: ViolationCategory, reason: impl Into<String>) -> Self {
        Self {
            category,
            reason: reason.into(),
        }
    }
}

/// Validates that candidate paths stay inside a workspace root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathBoundaryValidator {
    allow_absolute: bool,
    strict: bool,
}

impl PathBoundaryValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept absolute candidates, as long as they still land inside the root.
    pub fn with_allow_absolute(mut self, allow_absolute: bool) -> Self {
        self.allow_absolute = allow_absolute;
        self
    }

    /// Also refuse hidden (dot-prefixed) file names.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn validate(&self, root: &Path, candidate: &str) -> ValidationResult {
        match self.check(root, candidate) {
            Ok(_) => ValidationResult::Safe,
            Err(violation) => ValidationResult::Unsafe {
                category: violation.category,
                reason: violation.reason,
            },
        }
    }

    /// Resolve `candidate` to a canonical absolute path under `root`.
    pub fn resolve(&self, root: &Path, candidate: &str) -> Result<PathBuf, SandboxError> {
        if candidate.is_empty() {
            return Err(SandboxError::empty_path());
        }

        self.check(root, candidate).map_err(|violation| {
            debug!(
                path = candidate,
                reason = %violation.reason,
                "Rejected path outside workspace boundary"
            );
            let code = match violation.category {
                ViolationCategory::AbsolutePath => ErrorCode::AbsolutePathRejected,
                _ => ErrorCode::PathEscapeAttempt,
            };
            SandboxError::PathViolation {
                code,
                reason: violation.reason,
                path: candidate.to_owned(),
            }
        })
    }

    fn check(&self, root: &Path, candidate: &str) -> Result<PathBuf, Violation> {
        check_text(candidate)?;

        let path = Path::new(candidate);
        let absolute = path.is_absolute() || candidate.starts_with(['/', '\\']);
        if absolute && !self.allow_absolute {
            return Err(Violation::new(
                ViolationCategory::AbsolutePath,
                "Absolute paths are not allowed",
            ));
        }

        if candidate.contains("..") {
            return Err(Violation::new(
                ViolationCategory::PathEscape,
                "Path traversal sequences are not allowed",
            ));
        }

        let depth = candidate.matches(['/', '\\']).count();
        if depth > MAX_PATH_DEPTH {
            return Err(Violation::new(
                ViolationCategory::InvalidPath,
                format!("Path is nested too deeply ({depth} > {MAX_PATH_DEPTH} levels)"),
            ));
        }
        if candidate.contains("//") || candidate.contains("\\\\") {
            return Err(Violation::new(
                ViolationCategory::InvalidPath,
                "Path contains repeated separators",
            ));
        }

        let file_name = candidate
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(candidate);
        if let Some(reason) = blocklist::blocked_reason(file_name) {
            return Err(Violation::new(ViolationCategory::BlockedFile, reason));
        }

        let canonical_root = root.canonicalize().map_err(|err| {
            Violation::new(
                ViolationCategory::InvalidPath,
                format!("Workspace root is not accessible: {err}"),
            )
        })?;

        let joined = if absolute {
            path.to_path_buf()
        } else {
            root.join(path)
        };
        let resolved = canonicalize_allow_missing(&joined).map_err(|err| {
            Violation::new(
                ViolationCategory::InvalidPath,
                format!("Path could not be resolved: {err:#}"),
            )
        })?;
        if !resolved.starts_with(&canonical_root) {
            return Err(Violation::new(
                ViolationCategory::PathEscape,
                "Path escapes workspace boundary",
            ));
        }

        if joined.symlink_metadata().is_ok() {
            check_symlinks(root, &canonical_root, &joined)?;
        }

        if self.strict && file_name.starts_with('.') {
            return Err(Violation::new(
                ViolationCategory::HiddenFile,
                "Hidden files are not allowed",
            ));
        }

        Ok(resolved)
    }
}

fn check_text(candidate: &str) -> Result<(), Violation> {
    if candidate.is_empty() {
        return Err(Violation::new(
            ViolationCategory::InvalidPath,
            "Path cannot be empty",
        ));
    }

    if candidate
        .chars()
        .any(|ch| ch.is_control() && !matches!(ch, '\t' | '\n' | '\r'))
    {
        return Err(Violation::new(
            ViolationCategory::InvalidPath,
            "Path contains control characters",
        ));
    }

    let length = candidate.chars().count();
    if length > MAX_PATH_LENGTH {
        return Err(Violation::new(
            ViolationCategory::InvalidPath,
            format!("Path is too long ({length} > {MAX_PATH_LENGTH} characters)"),
        ));
    }

    Ok(())
}

/// Walk from the root down to `target`, refusing any symlink on the way that
/// leads out of the workspace.
fn check_symlinks(root: &Path, canonical_root: &Path, target: &Path) -> Result<(), Violation> {
    let relative = target.strip_prefix(root).unwrap_or(target);
    let mut current = root.to_path_buf();

    for component in relative.components() {
        let Component::Normal(part) = component else {
            continue;
        };
        current.push(part);

        let Ok(metadata) = current.symlink_metadata() else {
            break;
        };
        if !metadata.file_type().is_symlink() {
            continue;
        }

        // Dangling links are judged by where they would point.
        let Ok(destination) = canonicalize_allow_missing(&current) else {
            return Err(Violation::new(
                ViolationCategory::SymlinkEscape,
                "Symlink could not be resolved",
            ));
        };

        if !destination.starts_with(canonical_root) {
            return Err(Violation::new(
                ViolationCategory::SymlinkEscape,
                "Symlink points outside workspace",
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    fn reason(result: ValidationResult) -> String {
        result.reason().unwrap_or_default().to_owned()
    }

    #[test]
    fn accepts_existing_and_missing_files() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "hi").unwrap();
        let validator = PathBoundaryValidator::new();

        assert!(validator.validate(temp.path(), "a.txt").is_safe());
        assert!(validator.validate(temp.path(), "new/dir/b.txt").is_safe());

        let resolved = validator.resolve(temp.path(), "a.txt").unwrap();
        assert_eq!(resolved, temp.path().canonicalize().unwrap().join("a.txt"));
    }

    #[test]
    fn empty_candidate_is_a_usage_error() {
        let temp = TempDir::new().unwrap();
        let err = PathBoundaryValidator::new()
            .resolve(temp.path(), "")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::EmptyPath);
    }

    #[test]
    fn textual_checks() {
        let temp = TempDir::new().unwrap();
        let validator = PathBoundaryValidator::new();

        assert_eq!(
            reason(validator.validate(temp.path(), "a\0b")),
            "Path contains control characters"
        );
        assert!(validator.validate(temp.path(), "tab\there").is_safe());
        assert!(!validator.validate(temp.path(), &"a".repeat(4097)).is_safe());
        assert_eq!(
            reason(validator.validate(temp.path(), "a//b")),
            "Path contains repeated separators"
        );
        assert!(!validator
            .validate(temp.path(), &"d/".repeat(33))
            .is_safe());
    }

    #[test]
    fn absolute_paths_need_opt_in() {
        let temp = TempDir::new().unwrap();
        let inside = temp.path().canonicalize().unwrap().join("x.txt");
        let inside = inside.to_string_lossy();

        let err = PathBoundaryValidator::new()
            .resolve(temp.path(), &inside)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::AbsolutePathRejected);

        let permissive = PathBoundaryValidator::new().with_allow_absolute(true);
        assert!(permissive.validate(temp.path(), &inside).is_safe());
        assert_eq!(
            reason(permissive.validate(temp.path(), "/etc/hosts")),
            "Path escapes workspace boundary"
        );
    }

    #[test]
    fn traversal_is_rejected() {
        let temp = TempDir::new().unwrap();
        let err = PathBoundaryValidator::new()
            .resolve(temp.path(), "../b.txt")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PathEscapeAttempt);
        assert!(!PathBoundaryValidator::new()
            .validate(temp.path(), "a/..b")
            .is_safe());
    }

    #[test]
    fn blocked_names_are_rejected() {
        let temp = TempDir::new().unwrap();
        let result = PathBoundaryValidator::new().validate(temp.path(), "keys/id_rsa");
        assert_eq!(result.category(), Some(ViolationCategory::BlockedFile));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_leading_outside_are_rejected() {
        let workspace = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "s").unwrap();
        std::os::unix::fs::symlink(outside.path(), workspace.path().join("link")).unwrap();

        let result = PathBoundaryValidator::new().validate(workspace.path(), "link/secret.txt");
        assert!(!result.is_safe());
        assert!(matches!(
            result.category(),
            Some(ViolationCategory::PathEscape | ViolationCategory::SymlinkEscape)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlinks_leading_outside_are_rejected() {
        let workspace = TempDir::new().unwrap();
        std::os::unix::fs::symlink("/nonexistent-warden-target", workspace.path().join("dangling"))
            .unwrap();

        let result = PathBoundaryValidator::new().validate(workspace.path(), "dangling");
        assert!(!result.is_safe());
    }

    #[cfg(unix)]
    #[test]
    fn dangling_links_through_other_links_are_followed() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("ws");
        fs::create_dir(&root).unwrap();
        std::os::unix::fs::symlink("..", root.join("up")).unwrap();
        std::os::unix::fs::symlink("up/escaped.txt", root.join("dl")).unwrap();

        let validator = PathBoundaryValidator::new();
        assert!(!validator.validate(&root, "dl").is_safe());
        let err = validator.resolve(&root, "dl").unwrap_err();
        assert_eq!(err.code(), ErrorCode::PathEscapeAttempt);
        assert!(!validator.validate(&root, "up/escaped.txt").is_safe());
        assert!(!outer.path().join("escaped.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_within_the_workspace_are_fine() {
        let workspace = TempDir::new().unwrap();
        fs::create_dir(workspace.path().join("real")).unwrap();
        std::os::unix::fs::symlink(
            workspace.path().join("real"),
            workspace.path().join("alias"),
        )
        .unwrap();

        assert!(PathBoundaryValidator::new()
            .validate(workspace.path(), "alias/file.txt")
            .is_safe());
    }

    #[test]
    fn strict_mode_refuses_hidden_files() {
        let temp = TempDir::new().unwrap();
        let lenient = PathBoundaryValidator::new();
        let strict = PathBoundaryValidator::new().with_strict(true);

        assert!(lenient.validate(temp.path(), ".gitignore").is_safe());
        assert_eq!(
            strict.validate(temp.path(), ".gitignore").category(),
            Some(ViolationCategory::HiddenFile)
        );
        assert!(strict.validate(temp.path(), "src/main.rs").is_safe());
    }

    proptest! {
        #[test]
        fn accepted_paths_stay_inside_the_root(
            segments in prop::collection::vec(
                prop_oneof![
                    Just("..".to_owned()),
                    Just("/".to_owned()),
                    Just("~".to_owned()),
                    "[a-zA-Z0-9_.-]{1,8}",
                ],
                1..6,
            ),
            absolute in any::<bool>(),
        ) {
            let temp = TempDir::new().unwrap();
            let root = temp.path().canonicalize().unwrap();
            let joined = segments.join("/");
            let candidate = if absolute { format!("/{joined}") } else { joined };

            for validator in [
                PathBoundaryValidator::new(),
                PathBoundaryValidator::new().with_allow_absolute(true),
            ] {
                if let Ok(resolved) = validator.resolve(temp.path(), &candidate) {
                    prop_assert!(resolved.starts_with(&root));
                    prop_assert!(!candidate.contains(".."));
                }
            }
        }
    }
}
