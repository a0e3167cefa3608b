use std::process::ExitCode;

use anyhow::Result;
use warden_core::{FileKind, Sandbox};

pub async fn handle_read(sandbox: &Sandbox, path: &str) -> Result<ExitCode> {
    let content = sandbox.read(path).await?;
    print!("{content}");
    Ok(ExitCode::SUCCESS)
}

pub async fn handle_write(sandbox: &Sandbox, path: &str, content: &str) -> Result<ExitCode> {
    sandbox.write(path, content).await?;
    eprintln!("Wrote {} bytes to {path}", content.len());
    Ok(ExitCode::SUCCESS)
}

pub async fn handle_ls(
    sandbox: &Sandbox,
    pattern: &str,
    details: bool,
    json: bool,
) -> Result<ExitCode> {
    if details {
        let entries = sandbox.ls_details(pattern).await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
            return Ok(ExitCode::SUCCESS);
        }
        for entry in entries {
            let kind = match entry.kind {
                FileKind::File => "file",
                FileKind::Directory => "dir",
                FileKind::Symlink => "link",
            };
            println!(
                "{kind:<5} {:>10}  {}  {}",
                entry.size,
                entry.modified.format("%Y-%m-%d %H:%M"),
                entry.name
            );
        }
        return Ok(ExitCode::SUCCESS);
    }

    let names = sandbox.ls(pattern).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else {
        for name in names {
            println!("{name}");
        }
    }
    Ok(ExitCode::SUCCESS)
}
