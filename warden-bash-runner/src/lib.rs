//! Shell runner used by the warden sandbox.
//!
//! Commands are spawned with a caller-supplied environment (nothing is
//! inherited), in their own process group, and supervised until they exit.
//! A deadline and an optional [`ProcessWatchdog`] can stop them early; either
//! way the entire process group is killed so no descendants outlive the
//! command.

pub mod env;
pub mod executor;
pub mod process_group;
pub mod shell;
pub mod watchdog;

pub use env::{build_sandbox_env, inherited_user, SandboxEnv};
pub use executor::{
    CommandInvocation, CommandOutput, CommandStatus, ProcessCommandExecutor, Termination,
};
pub use shell::{find_utility, missing_utilities, ShellKind};
pub use watchdog::{ProcessWatchdog, WatchVerdict};
