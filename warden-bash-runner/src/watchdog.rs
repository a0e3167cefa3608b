/// Outcome of a single watchdog inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchVerdict {
    Continue,
    /// Kill the process group; the string explains which limit was breached.
    Terminate(String),
}

/// Periodically consulted while a command runs.
///
/// Implementations are called from a blocking task, so they may perform
/// synchronous system queries. Anything that cannot be observed should yield
/// [`WatchVerdict::Continue`].
pub trait ProcessWatchdog: Send + Sync + 'static {
    fn inspect(&self, pid: u32) -> WatchVerdict;
}
