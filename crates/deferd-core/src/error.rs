use deferd_model::TaskId;
use thiserror::Error;

use crate::{admission::Overflow, persist::PersistError, validate::ValidationError};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("task rejected: {0}")]
    Rejected(#[from] ValidationError),

    #[error(transparent)]
    Overflow(#[from] Overflow),

    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error("task {0} has already been executed")]
    AlreadyExecuted(TaskId),

    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),
}
