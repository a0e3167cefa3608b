use anyhow::Result;

/// Receives commands that were blocked by the dangerous-pattern scan when the
/// executor is configured to downgrade such rejections instead of failing.
///
/// Errors returned by a handler are logged by the caller and never surface to
/// whoever issued the command.
pub trait DangerousOperationHandler: Send + Sync {
    /// Called with the rejected command and the reason it was rejected.
    fn on_dangerous_operation(&self, command: &str, reason: &str) -> Result<()>;
}

/// A handler that ignores every notification. Useful for tests or for
/// consumers who only want the soft-block behaviour.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl DangerousOperationHandler for NoopHandler {
    fn on_dangerous_operation(&self, _command: &str, _reason: &str) -> Result<()> {
        Ok(())
    }
}

impl<F> DangerousOperationHandler for F
where
    F: Fn(&str, &str) -> Result<()> + Send + Sync,
{
    fn on_dangerous_operation(&self, command: &str, reason: &str) -> Result<()> {
        self(command, reason)
    }
}
