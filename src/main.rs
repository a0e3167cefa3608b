//! warden - run shell commands inside per-user sandboxed workspaces
//!
//! Thin binary entry point that delegates to the handlers in `cli`.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use warden_config::{BackendConfig, ConfigManager, LoggingConfig, WardenConfig};
use warden_core::SandboxError;

mod cli;

use cli::Cli;

/// Crates whose events are shown at the configured level.
const TRACE_TARGETS: &[&str] = &[
    "warden",
    "warden_core",
    "warden_config",
    "warden_bash_runner",
    "warden_commons",
];

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            match err.downcast_ref::<SandboxError>() {
                Some(sandbox_err) => eprintln!("error[{}]: {err:#}", sandbox_err.code()),
                None => eprintln!("error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> Result<ExitCode> {
    let config = load_config(&args)?;
    initialize_tracing(&config.logging);
    tracing::debug!(user_id = config.user_id(), "Configuration loaded");

    cli::dispatch(args, config).await
}

fn load_config(args: &Cli) -> Result<WardenConfig> {
    let manager = match &args.config {
        Some(path) => ConfigManager::load_from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => ConfigManager::load().context("failed to load configuration")?,
    };
    let mut config = manager.into_config();

    if let Some(user) = &args.user {
        let BackendConfig::Local(local) = &mut config.backend;
        local.user_id = Some(user.clone());
    }
    if let Some(root) = &args.workspace_root {
        config.workspace.root = root.clone();
    }

    config
        .validate()
        .context("invalid configuration after applying command-line overrides")?;
    Ok(config)
}

fn initialize_tracing(logging: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let level = logging.level.trim().to_ascii_lowercase();
    let directives = TRACE_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if logging.compact {
        builder.compact().try_init()
    } else {
        builder.try_init()
    };
    if let Err(err) = installed {
        eprintln!("warning: tracing already initialised: {err}");
    }
}
