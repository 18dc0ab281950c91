use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::{Task, TaskId, TaskStatus};

/// Exit code recorded when a command fails without an exit status of its own
/// (spawn error, killed by signal, malformed submission).
pub const FAILURE_EXIT_CODE: i32 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("illegal task transition from {from} to {to}")]
    Illegal { from: TaskStatus, to: TaskStatus },
}

/// The mutable unit of state tracking one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub task: Task,
    pub status: TaskStatus,
    /// Meaningful only once the status is terminal.
    #[serde(default)]
    pub exit_code: i32,
    /// Captured output; empty while scheduled and after cancellation.
    #[serde(default)]
    pub stdout: String,
    /// Failure detail, present only for `failed` records.
    #[serde(default)]
    pub stderr: Option<String>,
    /// When the record was admitted.
    #[serde(with = "time::serde::rfc3339")]
    pub scheduled_at: OffsetDateTime,
    /// When the record reached a terminal status.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub run_at: Option<OffsetDateTime>,
}

impl TaskRecord {
    /// Fresh record in the initial `scheduled` state.
    pub fn scheduled(id: TaskId, task: Task) -> Self {
        Self {
            id,
            task,
            status: TaskStatus::Scheduled,
            exit_code: 0,
            stdout: String::new(),
            stderr: None,
            scheduled_at: OffsetDateTime::now_utc(),
            run_at: None,
        }
    }

    /// Synthetic `failed` record for a submission whose body could not be decoded.
    pub fn malformed(id: TaskId, reason: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id,
            task: Task::default(),
            status: TaskStatus::Failed,
            exit_code: FAILURE_EXIT_CODE,
            stdout: String::new(),
            stderr: Some(reason.into()),
            scheduled_at: now,
            run_at: Some(now),
        }
    }

    pub fn mark_executed(&mut self, stdout: String) -> Result<(), TransitionError> {
        self.leave_scheduled(TaskStatus::Executed)?;
        self.exit_code = 0;
        self.stdout = stdout;
        self.stderr = None;
        Ok(())
    }

    /// A zero `exit_code` is replaced by [`FAILURE_EXIT_CODE`] so a failed record never reads as success.
    pub fn mark_failed(
        &mut self,
        exit_code: i32,
        stdout: String,
        error: impl Into<String>,
    ) -> Result<(), TransitionError> {
        self.leave_scheduled(TaskStatus::Failed)?;
        self.exit_code = if exit_code == 0 { FAILURE_EXIT_CODE } else { exit_code };
        self.stdout = stdout;
        self.stderr = Some(error.into());
        Ok(())
    }

    /// Cancel and clear every output field.
    pub fn mark_canceled(&mut self) -> Result<(), TransitionError> {
        self.leave_scheduled(TaskStatus::Canceled)?;
        self.exit_code = 0;
        self.stdout.clear();
        self.stderr = None;
        Ok(())
    }

    fn leave_scheduled(&mut self, to: TaskStatus) -> Result<(), TransitionError> {
        if self.status != TaskStatus::Scheduled {
            return Err(TransitionError::Illegal {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.run_at = Some(OffsetDateTime::now_utc());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> TaskRecord {
        TaskRecord::scheduled(TaskId::from("abcd1234"), Task::new("echo hi", 2))
    }

    #[test]
    fn scheduled_record_has_no_output() {
        let r = record();
        assert_eq!(r.status, TaskStatus::Scheduled);
        assert!(r.stdout.is_empty());
        assert!(r.stderr.is_none());
        assert!(r.run_at.is_none());
    }

    #[test]
    fn executed_sets_output_and_completion_time() {
        let mut r = record();
        r.mark_executed("hi\n".into()).unwrap();
        assert_eq!(r.status, TaskStatus::Executed);
        assert_eq!(r.exit_code, 0);
        assert_eq!(r.stdout, "hi\n");
        assert!(r.run_at.is_some());
    }

    #[test]
    fn failed_never_reports_zero_exit() {
        let mut r = record();
        r.mark_failed(0, String::new(), "spawn: not found").unwrap();
        assert_eq!(r.exit_code, FAILURE_EXIT_CODE);
        assert_eq!(r.stderr.as_deref(), Some("spawn: not found"));

        let mut r = record();
        r.mark_failed(2, String::new(), "exit code: 2").unwrap();
        assert_eq!(r.exit_code, 2);
    }

    #[test]
    fn terminal_states_are_final() {
        let mut r = record();
        r.mark_canceled().unwrap();

        assert_eq!(
            r.mark_executed("late".into()),
            Err(TransitionError::Illegal {
                from: TaskStatus::Canceled,
                to: TaskStatus::Executed,
            })
        );
        assert!(r.mark_canceled().is_err());
        assert!(r.stdout.is_empty());
    }

    #[test]
    fn wire_shape_is_stable() {
        let mut r = record();
        r.mark_failed(1, String::new(), "boom").unwrap();

        let value = serde_json::to_value(&r).unwrap();
        assert_eq!(value["id"], "abcd1234");
        assert_eq!(value["task"]["command"], "echo hi");
        assert_eq!(value["task"]["run_after_seconds"], 2);
        assert_eq!(value["status"], "failed");
        assert_eq!(value["exit_code"], 1);
        assert_eq!(value["stderr"], "boom");
        assert!(value["scheduled_at"].is_string());
        assert!(value["run_at"].is_string());

        let back: TaskRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back.id, r.id);
        assert_eq!(back.status, TaskStatus::Failed);
    }

    #[test]
    fn malformed_record_is_failed_with_reason() {
        let r = TaskRecord::malformed(TaskId::from("zzzz0000"), "expected value at line 1");
        assert_eq!(r.status, TaskStatus::Failed);
        assert_eq!(r.exit_code, FAILURE_EXIT_CODE);
        assert!(r.task.command.is_empty());
    }
}
