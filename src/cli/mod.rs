//! Command-line surface of the `warden` binary.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use warden_config::WardenConfig;
use warden_core::{Sandbox, WorkspaceManager};

mod exec;
mod files;
mod workspaces;

#[derive(Debug, Parser)]
#[command(name = "warden")]
#[command(about = "Run shell commands inside sandboxed per-user workspaces")]
#[command(version)]
pub struct Cli {
    /// Configuration file to use instead of the discovered `warden.toml`
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Workspace owner (overrides `backend.user_id`)
    #[arg(long, short, global = true)]
    pub user: Option<String>,

    /// Directory holding the per-user workspaces
    #[arg(long, global = true, value_name = "DIR")]
    pub workspace_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Validate and run a command in the user's workspace
    ///
    /// Examples:
    ///   warden exec ls -la
    ///   warden exec "grep -c TODO notes.md"
    Exec {
        /// Command line, passed to the shell as a single string
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Print a file from the user's workspace
    Read {
        path: String,
    },

    /// Write content to a file in the user's workspace
    Write {
        path: String,
        content: String,
    },

    /// List workspace entries matching a glob pattern
    Ls {
        #[arg(default_value = "*")]
        pattern: String,

        /// Show kind, size and modification time
        #[arg(long)]
        details: bool,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Validate a command without running it
    ///
    /// Exits non-zero when the command would be refused.
    Check {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Inspect and clean up workspaces
    Workspaces {
        #[command(subcommand)]
        command: WorkspaceCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum WorkspaceCommands {
    /// List known workspaces with their sizes
    List {
        #[arg(long)]
        json: bool,
    },

    /// Aggregate workspace statistics
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Remove a workspace
    ///
    /// Persistent workspaces are only deleted from disk with `--force`.
    Cleanup {
        user_id: String,

        #[arg(long)]
        force: bool,
    },
}

pub async fn dispatch(args: Cli, config: WardenConfig) -> Result<ExitCode> {
    let manager = Arc::new(WorkspaceManager::with_security(
        config.workspace.clone(),
        &config.security,
    )?);

    match args.command {
        Commands::Exec { command } => {
            let sandbox = open_sandbox(&config, manager)?;
            exec::handle_exec(&sandbox, &command.join(" ")).await
        }
        Commands::Check { command, json } => exec::handle_check(&command.join(" "), json),
        Commands::Read { path } => {
            let sandbox = open_sandbox(&config, manager)?;
            files::handle_read(&sandbox, &path).await
        }
        Commands::Write { path, content } => {
            let sandbox = open_sandbox(&config, manager)?;
            files::handle_write(&sandbox, &path, &content).await
        }
        Commands::Ls {
            pattern,
            details,
            json,
        } => {
            let sandbox = open_sandbox(&config, manager)?;
            files::handle_ls(&sandbox, &pattern, details, json).await
        }
        Commands::Workspaces { command } => workspaces::handle_workspaces(&manager, command),
    }
}

fn open_sandbox(config: &WardenConfig, manager: Arc<WorkspaceManager>) -> Result<Sandbox> {
    Ok(Sandbox::new(config.backend.clone(), manager)?)
}
