use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::trace;
use walkdir::WalkDir;

/// Lifecycle of a tracked workspace. Untracked and cleaned-up workspaces are
/// simply absent from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceState {
    Created,
    Active,
    Idle,
}

/// Snapshot of a workspace as known to the manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceInfo {
    pub user_id: String,
    pub path: PathBuf,
    pub created_at: DateTime<Local>,
    pub last_accessed: DateTime<Local>,
    pub size_bytes: u64,
    pub is_temporary: bool,
    pub state: WorkspaceState,
}

impl WorkspaceInfo {
    pub(crate) fn new(user_id: &str, path: PathBuf, is_temporary: bool) -> Self {
        let now = Local::now();
        Self {
            user_id: user_id.to_owned(),
            path,
            created_at: now,
            last_accessed: now,
            size_bytes: 0,
            is_temporary,
            state: WorkspaceState::Created,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, WorkspaceState::Created | WorkspaceState::Active)
    }

    pub fn size_mb(&self) -> f64 {
        bytes_to_mb(self.size_bytes)
    }

    pub(crate) fn touch(&mut self) {
        self.last_accessed = Local::now();
    }

    pub(crate) fn refresh_size(&mut self) {
        self.size_bytes = directory_size(&self.path);
    }
}

/// Aggregate view over every tracked workspace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkspaceStats {
    pub total: usize,
    pub active: usize,
    pub temporary: usize,
    pub persistent: usize,
    pub total_size_bytes: u64,
    pub average_size_bytes: u64,
    pub workspace_root: PathBuf,
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Total size of the regular files below `path`. Unreadable entries count as
/// zero.
pub(crate) fn directory_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                trace!(error = %err, "Skipping unreadable workspace entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}
