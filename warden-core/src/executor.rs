use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use warden_bash_runner::{
    build_sandbox_env, inherited_user, CommandInvocation, CommandOutput, ProcessCommandExecutor,
    SandboxEnv, ShellKind, Termination,
};
use warden_commons::DangerousOperationHandler;
use warden_config::constants::environment::{FALLBACK_USER, SAFE_LOCALE, SAFE_PATH};
use warden_config::constants::execution::TRUNCATION_RESERVE;
use warden_config::constants::resources::WATCHDOG_POLL_INTERVAL_MS;
use warden_config::constants::workspace::TMP_DIR;
use warden_config::{LocalBackendConfig, ShellPreference};

use crate::command_safety::{AuditEntry, CommandSafetyValidator, SafetyAuditLogger};
use crate::error::{Result, SandboxError};
use crate::resource_monitor::ResourceMonitor;
use crate::validation::{ValidationResult, ViolationCategory};
use crate::workspace::{validate_user_id, WorkspaceManager};

/// What a finished command produced, after trimming and truncation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ExecOutcome {
    stdout: String,
    exit_code: Option<i32>,
    truncated: bool,
}

/// Runs validated commands inside one user's workspace.
///
/// Each executor owns its concurrency slots, so two executors never compete
/// for permits even when they share a [`WorkspaceManager`].
pub struct SandboxExecutor {
    manager: Arc<WorkspaceManager>,
    user_id: String,
    config: LocalBackendConfig,
    slots: Arc<Semaphore>,
    validator: CommandSafetyValidator,
    handler: Option<Arc<dyn DangerousOperationHandler>>,
    audit: SafetyAuditLogger,
    monitor: Arc<ResourceMonitor>,
    runner: ProcessCommandExecutor,
    shell: PathBuf,
}

impl std::fmt::Debug for SandboxExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxExecutor")
            .field("user_id", &self.user_id)
            .field("shell", &self.shell)
            .field("available_slots", &self.slots.available_permits())
            .field("handler", &self.handler.is_some())
            .finish_non_exhaustive()
    }
}

impl SandboxExecutor {
    /// Build an executor for `config`. The user id falls back to the
    /// manager's default user when the backend does not name one.
    pub fn new(config: LocalBackendConfig, manager: Arc<WorkspaceManager>) -> Result<Self> {
        config.validate()?;

        let user_id = config
            .user_id
            .clone()
            .unwrap_or_else(|| manager.config().default_user_id.clone());
        validate_user_id(&user_id)?;

        let shell = resolve_shell(config.execution.shell);
        let monitor = Arc::new(ResourceMonitor::new(config.resource_limits.clone()));
        let runner = ProcessCommandExecutor::with_watchdog(monitor.clone());

        debug!(user_id = %user_id, shell = %shell.display(), "Created sandbox executor");

        Ok(Self {
            slots: Arc::new(Semaphore::new(config.execution.max_concurrent_commands)),
            audit: SafetyAuditLogger::new(config.execution.audit_commands),
            validator: CommandSafetyValidator::new(),
            handler: None,
            manager,
            user_id,
            config,
            monitor,
            runner,
            shell,
        })
    }

    /// Attach the callback that receives soft-blocked commands.
    pub fn with_handler(mut self, handler: Arc<dyn DangerousOperationHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn config(&self) -> &LocalBackendConfig {
        &self.config
    }

    pub fn manager(&self) -> &Arc<WorkspaceManager> {
        &self.manager
    }

    pub fn audit_logger(&self) -> &SafetyAuditLogger {
        &self.audit
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Validate `command` and run it in the user's workspace, returning its
    /// trimmed stdout.
    ///
    /// A dangerous-pattern rejection is downgraded to an empty result when
    /// `prevent_dangerous` is set and a handler is attached; every other
    /// rejection is an error.
    #[tracing::instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn exec(&self, command: &str) -> Result<String> {
        if command.trim().is_empty() {
            return Err(SandboxError::empty_command());
        }

        let verdict = self.validator.validate(command);
        self.audit.log(AuditEntry::new(command, &verdict)).await;

        if let ValidationResult::Unsafe { category, reason } = verdict {
            return self.reject(command, category, reason);
        }

        let _permit = self
            .slots
            .acquire()
            .await
            .map_err(|err| SandboxError::Spawn {
                command: command.to_owned(),
                source: err.into(),
            })?;

        self.advise_host_pressure().await;

        let outcome = self.run(command).await?;
        debug!(
            exit_code = ?outcome.exit_code,
            truncated = outcome.truncated,
            "Command finished"
        );
        Ok(outcome.stdout)
    }

    fn reject(
        &self,
        command: &str,
        category: ViolationCategory,
        reason: String,
    ) -> Result<String> {
        warn!(%reason, %command, %category, "Command rejected");

        if self.config.execution.prevent_dangerous && category == ViolationCategory::DangerousPattern
        {
            if let Some(handler) = &self.handler {
                if let Err(err) = handler.on_dangerous_operation(command, &reason) {
                    warn!(error = %err, %command, "Dangerous operation handler failed");
                }
                info!(%command, "Dangerous command soft-blocked");
                return Ok(String::new());
            }
        }

        Err(SandboxError::SafetyViolation {
            reason,
            command: command.to_owned(),
        })
    }

    /// Host pressure is reported but never blocks a command.
    async fn advise_host_pressure(&self) {
        let monitor = Arc::clone(&self.monitor);
        match tokio::task::spawn_blocking(move || monitor.check_system_resources()).await {
            Ok(Some(warning)) => warn!(%warning, "Host under resource pressure; proceeding"),
            Ok(None) => {}
            Err(err) => debug!(error = %err, "Host resource check did not complete"),
        }
    }

    async fn run(&self, command: &str) -> Result<ExecOutcome> {
        let workspace = self.manager.ensure_workspace(&self.user_id)?;
        let tmp_dir = workspace.join(TMP_DIR);
        let user = inherited_user().unwrap_or_else(|| FALLBACK_USER.to_owned());

        let env = build_sandbox_env(&SandboxEnv {
            search_path: SAFE_PATH,
            locale: SAFE_LOCALE,
            user: &user,
            shell: &self.shell,
            workspace: &workspace,
            tmp_dir: &tmp_dir,
        });

        let timeout = self.config.execution.timeout();
        let invocation = CommandInvocation::shell(&self.shell, command, &workspace)
            .with_env(env)
            .with_timeout(timeout)
            .with_watch_interval(Duration::from_millis(WATCHDOG_POLL_INTERVAL_MS));

        let output = self
            .runner
            .execute(&invocation)
            .await
            .map_err(|source| SandboxError::Spawn {
                command: command.to_owned(),
                source,
            })?;

        self.interpret(command, timeout, &output)
    }

    fn interpret(
        &self,
        command: &str,
        timeout: Duration,
        output: &CommandOutput,
    ) -> Result<ExecOutcome> {
        match output.status.termination() {
            Termination::TimedOut => {
                warn!(%command, timeout_secs = timeout.as_secs_f64(), "Command timed out");
                return Err(SandboxError::Timeout {
                    command: command.to_owned(),
                    timeout,
                });
            }
            Termination::Killed { reason } => {
                warn!(%reason, %command, "Command stopped by resource watchdog");
                return Err(SandboxError::ResourceLimitExceeded {
                    reason: reason.clone(),
                    command: command.to_owned(),
                });
            }
            Termination::Exited => {}
        }

        let exit_code = output.status.code();
        if !output.status.success() {
            let detail = match output.stderr.trim() {
                "" => output.stdout.trim(),
                stderr => stderr,
            };
            let code = exit_code.map_or_else(|| "unknown".to_owned(), |code| code.to_string());
            return Err(SandboxError::ExecutionFailure {
                exit_code,
                message: format!("Command execution failed with exit code {code}: {detail}"),
                command: command.to_owned(),
            });
        }

        let trimmed = output.stdout.trim_end_matches(['\n', '\r']);
        let (stdout, truncated) = match self.config.execution.max_output_length {
            Some(max) => truncate_output(trimmed, max),
            None => (trimmed.to_owned(), false),
        };

        Ok(ExecOutcome {
            stdout,
            exit_code,
            truncated,
        })
    }
}

fn resolve_shell(preference: ShellPreference) -> PathBuf {
    let kind = match preference {
        ShellPreference::Bash => ShellKind::Bash,
        ShellPreference::Sh => ShellKind::Sh,
        ShellPreference::Auto => ShellKind::detect(SAFE_PATH),
    };
    kind.resolve(SAFE_PATH)
}

/// Cut `output` to `max - 50` characters plus a notice when it is longer than
/// `max` characters.
fn truncate_output(output: &str, max: usize) -> (String, bool) {
    let total = output.chars().count();
    if total <= max {
        return (output.to_owned(), false);
    }

    let shown = max.saturating_sub(TRUNCATION_RESERVE);
    let head: String = output.chars().take(shown).collect();
    (
        format!(
            "{head}\n\n... [Output truncated. Full output was {total} characters, showing first {shown}]"
        ),
        true,
    )
}
