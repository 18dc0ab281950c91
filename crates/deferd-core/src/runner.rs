use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunnerError {
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("io error: {0}")]
    Io(String),
}

/// Captured result of one command invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl RunOutput {
    #[inline]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Executes a whitelisted command line.
///
/// Implementations are swappable per platform; the engine only relies on the captured output
/// and exit status. An invocation is never interrupted once started.
#[async_trait]
pub trait CommandRunner: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn run(&self, command_line: &str) -> Result<RunOutput, RunnerError>;
}
