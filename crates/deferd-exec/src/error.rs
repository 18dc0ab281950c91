use deferd_core::RunnerError;
use thiserror::Error;

pub type ExecResult<T> = Result<T, ExecError>;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("empty command line")]
    EmptyCommand,
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ExecError {
    fn from(e: std::io::Error) -> Self {
        ExecError::Io(e.to_string())
    }
}

impl From<ExecError> for RunnerError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::EmptyCommand => RunnerError::Spawn(e.to_string()),
            ExecError::Spawn(reason) => RunnerError::Spawn(reason),
            ExecError::Io(reason) => RunnerError::Io(reason),
        }
    }
}
