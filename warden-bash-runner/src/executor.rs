use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::process_group;
use crate::watchdog::{ProcessWatchdog, WatchVerdict};

const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_millis(250);
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Describes a program run by [`ProcessCommandExecutor`].
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Complete child environment. Nothing is inherited from the parent.
    pub env: HashMap<String, String>,
    pub timeout: Option<Duration>,
    pub watch_interval: Duration,
}

impl CommandInvocation {
    /// `<shell> -c <script>` in `working_dir`.
    pub fn shell(shell: impl Into<PathBuf>, script: &str, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: shell.into(),
            args: vec!["-c".to_owned(), script.to_owned()],
            working_dir: working_dir.into(),
            env: HashMap::new(),
            timeout: None,
            watch_interval: DEFAULT_WATCH_INTERVAL,
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_watch_interval(mut self, interval: Duration) -> Self {
        self.watch_interval = interval;
        self
    }
}

/// How the child's run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The child exited on its own (normally or by a signal it received).
    Exited,
    /// The deadline passed and the process group was killed.
    TimedOut,
    /// The watchdog asked for termination and the process group was killed.
    Killed { reason: String },
}

/// Describes the exit status of a command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStatus {
    code: Option<i32>,
    termination: Termination,
}

impl CommandStatus {
    pub fn new(code: Option<i32>, termination: Termination) -> Self {
        Self { code, termination }
    }

    pub fn success(&self) -> bool {
        self.termination == Termination::Exited && self.code == Some(0)
    }

    /// Exit code; `None` when the child was terminated by a signal.
    pub fn code(&self) -> Option<i32> {
        self.code
    }

    pub fn termination(&self) -> &Termination {
        &self.termination
    }
}

/// Output produced by the executor for a command invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: CommandStatus,
    /// Lossily decoded UTF-8.
    pub stdout: String,
    /// Lossily decoded UTF-8.
    pub stderr: String,
    pub elapsed: Duration,
}

/// Spawns commands in their own process group and supervises them until they
/// exit, time out or are stopped by the watchdog.
#[derive(Clone, Default)]
pub struct ProcessCommandExecutor {
    watchdog: Option<Arc<dyn ProcessWatchdog>>,
}

impl std::fmt::Debug for ProcessCommandExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessCommandExecutor")
            .field("watchdog", &self.watchdog.is_some())
            .finish()
    }
}

impl ProcessCommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_watchdog(watchdog: Arc<dyn ProcessWatchdog>) -> Self {
        Self {
            watchdog: Some(watchdog),
        }
    }

    /// Run `invocation` to completion.
    ///
    /// Timeouts and watchdog kills are reported through
    /// [`CommandStatus::termination`]; errors are reserved for failures to
    /// spawn or wait on the child. Dropping the returned future kills the
    /// process group.
    pub async fn execute(&self, invocation: &CommandInvocation) -> Result<CommandOutput> {
        let started = Instant::now();
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .env_clear()
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(target_os = "linux")]
        let parent_pid = unsafe { libc::getpid() };

        #[cfg(unix)]
        unsafe {
            command.pre_exec(move || {
                process_group::set_process_group()?;
                #[cfg(target_os = "linux")]
                process_group::set_parent_death_signal(parent_pid)?;
                Ok(())
            });
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn {}", invocation.program.display()))?;
        let pid = child
            .id()
            .ok_or_else(|| std::io::Error::other("missing child pid"))?;
        let group = ProcessGroupGuard { pgid: pid };

        let stdout_buf = Arc::new(Mutex::new(Vec::new()));
        let stderr_buf = Arc::new(Mutex::new(Vec::new()));
        let readers = [
            child
                .stdout
                .take()
                .map(|pipe| spawn_reader(pipe, Arc::clone(&stdout_buf))),
            child
                .stderr
                .take()
                .map(|pipe| spawn_reader(pipe, Arc::clone(&stderr_buf))),
        ];

        let deadline = invocation
            .timeout
            .map(|timeout| tokio::time::Instant::now() + timeout);
        let timeout_elapsed = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timeout_elapsed);

        let mut ticker = tokio::time::interval(invocation.watch_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let (termination, exit_status) = loop {
            tokio::select! {
                status = child.wait() => {
                    let status = status.context("failed to wait for child process")?;
                    break (Termination::Exited, Some(status));
                }
                () = &mut timeout_elapsed => {
                    debug!(pid, "deadline reached; killing process group");
                    break (Termination::TimedOut, None);
                }
                _ = ticker.tick(), if self.watchdog.is_some() => {
                    if let Some(reason) = self.inspect(pid).await {
                        debug!(pid, %reason, "watchdog requested termination");
                        break (Termination::Killed { reason }, None);
                    }
                }
            }
        };

        // Reap the leader and clear out anything it left behind in its group so
        // the output pipes reach EOF.
        group.kill();
        let code = match exit_status {
            Some(status) => status.code(),
            None => {
                if let Err(err) = child.wait().await {
                    warn!(pid, error = %err, "failed to reap killed child");
                }
                None
            }
        };

        for reader in readers.into_iter().flatten() {
            drain_reader(reader).await;
        }

        let stdout = String::from_utf8_lossy(&stdout_buf.lock()).into_owned();
        let stderr = String::from_utf8_lossy(&stderr_buf.lock()).into_owned();

        Ok(CommandOutput {
            status: CommandStatus::new(code, termination),
            stdout,
            stderr,
            elapsed: started.elapsed(),
        })
    }

    async fn inspect(&self, pid: u32) -> Option<String> {
        let watchdog = Arc::clone(self.watchdog.as_ref()?);
        match tokio::task::spawn_blocking(move || watchdog.inspect(pid)).await {
            Ok(WatchVerdict::Terminate(reason)) => Some(reason),
            Ok(WatchVerdict::Continue) => None,
            Err(err) => {
                debug!(pid, error = %err, "watchdog inspection did not complete");
                None
            }
        }
    }
}

/// Kills the whole process group when dropped, including when the executing
/// future is cancelled.
struct ProcessGroupGuard {
    pgid: u32,
}

impl ProcessGroupGuard {
    fn kill(&self) {
        if let Err(err) = process_group::kill_process_group(self.pgid) {
            debug!(pgid = self.pgid, error = %err, "failed to kill process group");
        }
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

fn spawn_reader<R>(mut reader: R, sink: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; 8_192];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if let Some(chunk) = buf.get(..n) {
                        sink.lock().extend_from_slice(chunk);
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    })
}

async fn drain_reader(handle: JoinHandle<()>) {
    let abort = handle.abort_handle();
    if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, handle).await.is_err() {
        // A process that escaped the group may still hold the pipe open.
        abort.abort();
    }
}
