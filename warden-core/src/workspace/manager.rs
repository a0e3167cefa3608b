use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use warden_commons::canonicalize_workspace;
use warden_config::constants::workspace::{TEMP_PREFIX, TMP_DIR, USERS_DIR};
use warden_config::{SecurityConfig, WorkspaceConfig};

use super::info::{WorkspaceInfo, WorkspaceState, WorkspaceStats};
use super::user_id::validate_user_id;
use crate::error::SandboxError;
use crate::path_boundary::PathBoundaryValidator;

/// Owns every workspace directory below `<root>/users` plus the temporary
/// workspaces it created, and is the only component that deletes them.
///
/// All bookkeeping lives behind one mutex; no method calls another locking
/// method while holding it.
#[derive(Debug)]
pub struct WorkspaceManager {
    config: WorkspaceConfig,
    root: PathBuf,
    users_dir: PathBuf,
    path_validator: PathBoundaryValidator,
    workspaces: Mutex<HashMap<String, WorkspaceInfo>>,
}

impl WorkspaceManager {
    pub fn new(config: WorkspaceConfig) -> Result<Self, SandboxError> {
        Self::with_security(config, &SecurityConfig::default())
    }

    /// Like [`Self::new`], with the path policy used by
    /// [`Self::validate_path_in_workspace`].
    pub fn with_security(
        config: WorkspaceConfig,
        security: &SecurityConfig,
    ) -> Result<Self, SandboxError> {
        let users_dir = config.root.join(USERS_DIR);
        create_private_dir(&users_dir, config.permissions).map_err(|err| {
            SandboxError::workspace(
                USERS_DIR,
                format!(
                    "Cannot create workspace directory {}: {err}",
                    users_dir.display()
                ),
            )
        })?;

        let root = canonicalize_workspace(&config.root);
        let users_dir = root.join(USERS_DIR);
        info!(root = %root.display(), "Workspace manager ready");

        Ok(Self {
            config,
            root,
            users_dir,
            path_validator: PathBoundaryValidator::new()
                .with_strict(security.strict_path_validation)
                .with_allow_absolute(security.allow_absolute_paths),
            workspaces: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    /// Path policy derived from the security configuration.
    pub fn path_validator(&self) -> PathBoundaryValidator {
        self.path_validator
    }

    /// Directory a persistent workspace for `user_id` lives in.
    pub fn persistent_path(&self, user_id: &str) -> Result<PathBuf, SandboxError> {
        validate_user_id(user_id)?;
        Ok(self.users_dir.join(user_id))
    }

    /// Create (or reuse) the workspace for `user_id`.
    ///
    /// A tracked workspace that is still on disk is returned as is.
    pub fn create_workspace(&self, user_id: &str, temporary: bool) -> Result<PathBuf, SandboxError> {
        validate_user_id(user_id)?;

        let mut workspaces = self.workspaces.lock();
        if let Some(existing) = workspaces.get_mut(user_id) {
            if existing.path.exists() {
                existing.touch();
                debug!(user_id, "Reusing existing workspace");
                return Ok(existing.path.clone());
            }
        }

        let path = if temporary {
            let dir = tempfile::Builder::new()
                .prefix(&format!("{TEMP_PREFIX}{user_id}_"))
                .tempdir()
                .map_err(|err| {
                    SandboxError::workspace(
                        user_id,
                        format!("Failed to create temporary workspace: {err}"),
                    )
                })?;
            dir.keep()
        } else {
            self.users_dir.join(user_id)
        };

        create_private_dir(&path, self.config.permissions)
            .and_then(|()| fs::create_dir_all(path.join(TMP_DIR)))
            .map_err(|err| {
                SandboxError::workspace(
                    user_id,
                    format!("Failed to create workspace {}: {err}", path.display()),
                )
            })?;

        info!(
            user_id,
            path = %path.display(),
            temporary,
            "Created workspace"
        );

        let mut info = WorkspaceInfo::new(user_id, path.clone(), temporary);
        let size_check = self.check_size_limit(&mut info);
        workspaces.insert(user_id.to_owned(), info);
        size_check?;

        Ok(path)
    }

    /// Path of an existing workspace, creating a persistent one if needed.
    ///
    /// Runs on every command and file operation, so a tracked workspace that
    /// is still on disk is returned without measuring its size.
    pub fn ensure_workspace(&self, user_id: &str) -> Result<PathBuf, SandboxError> {
        validate_user_id(user_id)?;

        {
            let mut workspaces = self.workspaces.lock();
            if let Some(info) = workspaces.get_mut(user_id) {
                if info.path.is_dir() {
                    info.touch();
                    return Ok(info.path.clone());
                }
            }
        }

        match self.get_workspace_info(user_id) {
            Some(info) if info.path.is_dir() => Ok(info.path),
            _ => self.create_workspace(user_id, false),
        }
    }

    /// Refreshed metadata for `user_id`, adopting an on-disk persistent
    /// workspace that is not tracked yet. Invalid ids yield `None`.
    pub fn get_workspace_info(&self, user_id: &str) -> Option<WorkspaceInfo> {
        if validate_user_id(user_id).is_err() {
            return None;
        }

        let mut workspaces = self.workspaces.lock();
        if let Some(info) = workspaces.get_mut(user_id) {
            info.refresh_size();
            info.touch();
            return Some(info.clone());
        }

        let path = self.users_dir.join(user_id);
        let metadata = fs::metadata(&path).ok().filter(|meta| meta.is_dir())?;

        let mut info = WorkspaceInfo::new(user_id, path, false);
        if let Ok(created) = metadata.created().or_else(|_| metadata.modified()) {
            info.created_at = DateTime::<Local>::from(created);
        }
        if let Ok(accessed) = metadata.accessed() {
            info.last_accessed = DateTime::<Local>::from(accessed);
        }
        info.state = WorkspaceState::Idle;
        info.refresh_size();
        debug!(user_id, "Adopted existing workspace from disk");

        workspaces.insert(user_id.to_owned(), info.clone());
        Some(info)
    }

    /// Refresh `info.size_bytes` and fail if it exceeds the configured limit.
    pub fn check_size_limit(&self, info: &mut WorkspaceInfo) -> Result<(), SandboxError> {
        let Some(limit_mb) = self.config.max_workspace_size_mb else {
            return Ok(());
        };

        info.refresh_size();
        let size_mb = info.size_mb();
        if info.size_bytes > limit_mb.saturating_mul(1024 * 1024) {
            warn!(
                user_id = %info.user_id,
                size_mb,
                limit_mb,
                "Workspace size limit exceeded"
            );
            return Err(SandboxError::workspace(
                &info.user_id,
                format!("Workspace size limit exceeded: {size_mb:.1}MB > {limit_mb}MB"),
            ));
        }

        Ok(())
    }

    /// Resolve `path` inside the workspace of `user_id`.
    pub fn validate_path_in_workspace(
        &self,
        path: &str,
        user_id: &str,
    ) -> Result<PathBuf, SandboxError> {
        let root = self.workspace_path(user_id)?;
        self.path_validator.resolve(&root, path)
    }

    /// Remove a workspace from tracking.
    ///
    /// Temporary workspaces are deleted from disk; persistent ones only when
    /// `force` is set. Returns `false` for untracked ids and for deletions
    /// that failed.
    pub fn cleanup_workspace(&self, user_id: &str, force: bool) -> Result<bool, SandboxError> {
        validate_user_id(user_id)?;

        let mut workspaces = self.workspaces.lock();
        let Some(info) = workspaces.remove(user_id) else {
            return Ok(false);
        };

        if !(info.is_temporary || force) {
            info!(user_id, "Stopped tracking persistent workspace");
            return Ok(true);
        }

        match remove_dir_if_present(&info.path) {
            Ok(()) => {
                info!(user_id, path = %info.path.display(), "Removed workspace");
                Ok(true)
            }
            Err(err) => {
                warn!(
                    user_id,
                    path = %info.path.display(),
                    error = %err,
                    "Failed to remove workspace"
                );
                Ok(false)
            }
        }
    }

    /// Remove every temporary workspace, tolerating individual failures.
    pub fn cleanup_all(&self) {
        let temporary: Vec<String> = self
            .workspaces
            .lock()
            .values()
            .filter(|info| info.is_temporary)
            .map(|info| info.user_id.clone())
            .collect();

        for user_id in temporary {
            match self.cleanup_workspace(&user_id, true) {
                Ok(true) => {}
                Ok(false) => warn!(user_id, "Temporary workspace was not removed"),
                Err(err) => warn!(user_id, error = %err, "Failed to clean up workspace"),
            }
        }
    }

    /// Start tracking every persistent workspace found under `users/`.
    /// Returns how many are tracked afterwards.
    pub fn adopt_persistent_workspaces(&self) -> usize {
        let entries = match fs::read_dir(&self.users_dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    path = %self.users_dir.display(),
                    error = %err,
                    "Cannot scan workspace directory"
                );
                return 0;
            }
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter_map(|user_id| self.get_workspace_info(&user_id))
            .count()
    }

    /// Every tracked workspace with a freshly computed size.
    pub fn list_workspaces(&self) -> Vec<WorkspaceInfo> {
        let mut workspaces = self.workspaces.lock();
        let mut listed: Vec<WorkspaceInfo> = workspaces
            .values_mut()
            .map(|info| {
                info.refresh_size();
                info.clone()
            })
            .collect();
        listed.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        listed
    }

    pub fn stats(&self) -> WorkspaceStats {
        let workspaces = self.list_workspaces();
        let total = workspaces.len();
        let temporary = workspaces.iter().filter(|info| info.is_temporary).count();
        let total_size_bytes: u64 = workspaces.iter().map(|info| info.size_bytes).sum();

        WorkspaceStats {
            total,
            active: workspaces.iter().filter(|info| info.is_active()).count(),
            temporary,
            persistent: total - temporary,
            total_size_bytes,
            average_size_bytes: total_size_bytes / u64::try_from(total.max(1)).unwrap_or(1),
            workspace_root: self.root.clone(),
        }
    }

    /// Toggle a tracked workspace between active and idle.
    pub fn set_workspace_active(&self, user_id: &str, active: bool) -> Result<(), SandboxError> {
        validate_user_id(user_id)?;

        if let Some(info) = self.workspaces.lock().get_mut(user_id) {
            info.state = if active {
                WorkspaceState::Active
            } else {
                WorkspaceState::Idle
            };
            info.touch();
        }
        Ok(())
    }

    /// A temporary workspace that is force-removed when the guard drops.
    pub fn temporary_workspace(&self, user_id: &str) -> Result<TemporaryWorkspace<'_>, SandboxError> {
        validate_user_id(user_id)?;
        let already_tracked = self.workspaces.lock().contains_key(user_id);
        let path = self.create_workspace(user_id, true)?;

        Ok(TemporaryWorkspace {
            manager: self,
            user_id: user_id.to_owned(),
            path,
            owned: !already_tracked,
        })
    }

    fn workspace_path(&self, user_id: &str) -> Result<PathBuf, SandboxError> {
        validate_user_id(user_id)?;
        let tracked = self
            .workspaces
            .lock()
            .get(user_id)
            .map(|info| info.path.clone());
        Ok(tracked.unwrap_or_else(|| self.users_dir.join(user_id)))
    }
}

impl Drop for WorkspaceManager {
    fn drop(&mut self) {
        if self.config.cleanup_on_exit {
            self.cleanup_all();
        }
    }
}

/// Guard returned by [`WorkspaceManager::temporary_workspace`].
#[derive(Debug)]
pub struct TemporaryWorkspace<'a> {
    manager: &'a WorkspaceManager,
    user_id: String,
    path: PathBuf,
    owned: bool,
}

impl TemporaryWorkspace<'_> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl Drop for TemporaryWorkspace<'_> {
    fn drop(&mut self) {
        if !self.owned {
            return;
        }
        if let Err(err) = self.manager.cleanup_workspace(&self.user_id, true) {
            warn!(user_id = %self.user_id, error = %err, "Failed to drop temporary workspace");
        }
    }
}

fn create_private_dir(path: &Path, mode: u32) -> io::Result<()> {
    fs::create_dir_all(path)?;
    set_mode(path, mode)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

fn remove_dir_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
