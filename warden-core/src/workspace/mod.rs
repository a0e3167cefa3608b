//! Per-user workspace lifecycle.
//!
//! Workspaces move through `Created -> Active <-> Idle` while tracked and
//! disappear from the registry when cleaned up.

mod info;
mod manager;
mod user_id;

pub use info::{WorkspaceInfo, WorkspaceState, WorkspaceStats};
pub use manager::{TemporaryWorkspace, WorkspaceManager};
pub use user_id::validate_user_id;
