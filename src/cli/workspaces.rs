use std::process::ExitCode;

use anyhow::Result;
use warden_core::WorkspaceManager;

use super::WorkspaceCommands;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub fn handle_workspaces(manager: &WorkspaceManager, command: WorkspaceCommands) -> Result<ExitCode> {
    manager.adopt_persistent_workspaces();

    match command {
        WorkspaceCommands::List { json } => {
            let workspaces = manager.list_workspaces();
            if json {
                println!("{}", serde_json::to_string_pretty(&workspaces)?);
                return Ok(ExitCode::SUCCESS);
            }
            if workspaces.is_empty() {
                eprintln!("No workspaces under {}", manager.root().display());
            }
            for info in workspaces {
                let kind = if info.is_temporary { "temp" } else { "persistent" };
                println!(
                    "{:<24} {kind:<10} {:>8.2} MB  {}",
                    info.user_id,
                    info.size_mb(),
                    info.path.display()
                );
            }
        }
        WorkspaceCommands::Stats { json } => {
            let stats = manager.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
                return Ok(ExitCode::SUCCESS);
            }
            println!("root:       {}", stats.workspace_root.display());
            println!("total:      {}", stats.total);
            println!("active:     {}", stats.active);
            println!("temporary:  {}", stats.temporary);
            println!("persistent: {}", stats.persistent);
            println!("size:       {:.2} MB", to_mb(stats.total_size_bytes));
            println!("average:    {:.2} MB", to_mb(stats.average_size_bytes));
        }
        WorkspaceCommands::Cleanup { user_id, force } => {
            if manager.cleanup_workspace(&user_id, force)? {
                let action = if force { "Removed" } else { "Released" };
                println!("{action} workspace for {user_id}");
            } else {
                eprintln!("No workspace removed for {user_id}");
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[allow(clippy::cast_precision_loss)]
fn to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}
