use std::process::ExitCode;

use anyhow::Result;
use serde_json::json;
use warden_core::{validate_command, Sandbox, ValidationResult};

pub async fn handle_exec(sandbox: &Sandbox, command: &str) -> Result<ExitCode> {
    let output = sandbox.exec(command).await?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(ExitCode::SUCCESS)
}

pub fn handle_check(command: &str, json: bool) -> Result<ExitCode> {
    let verdict = validate_command(command);

    if json {
        let report = json!({
            "command": command,
            "safe": verdict.is_safe(),
            "category": verdict.category(),
            "reason": verdict.reason(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match &verdict {
            ValidationResult::Safe => println!("safe"),
            ValidationResult::Unsafe { category, reason } => {
                println!("unsafe [{category}]: {reason}");
            }
        }
    }

    Ok(if verdict.is_safe() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
