//! Shared helpers reused across the warden crates. Path handling lives here
//! so the workspace manager and the path validator agree on what "inside the
//! workspace" means, and the dangerous-operation hook is defined here so
//! embedders can implement it without depending on `warden-core` internals.

pub mod hooks;
pub mod paths;

pub use hooks::{DangerousOperationHandler, NoopHandler};
pub use paths::{canonicalize_allow_missing, canonicalize_workspace};
