use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a task record.
///
/// `Scheduled` is the only non-terminal state; every other state is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting for its delay to elapse (or running, once claimed by its executor).
    Scheduled,
    /// Command ran and exited with status 0.
    Executed,
    /// Command ran and failed, or could not be started.
    Failed,
    /// Canceled by a delete request or by the safety timeout.
    Canceled,
}

impl TaskStatus {
    /// Returns `true` if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Scheduled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::Executed => "executed",
            TaskStatus::Failed => "failed",
            TaskStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown task status: '{0}' (valid: scheduled, executed, failed, canceled)")]
pub struct UnknownStatus(pub String);

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Ok(TaskStatus::Scheduled),
            "executed" => Ok(TaskStatus::Executed),
            "failed" => Ok(TaskStatus::Failed),
            "canceled" | "cancelled" => Ok(TaskStatus::Canceled),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}
