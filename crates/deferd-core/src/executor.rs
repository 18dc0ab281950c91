//! Per-task state machine: wait out the delay, the safety deadline or a cancellation,
//! whichever comes first, then record the result.

use std::{future, sync::Arc, thread, time::Duration};

use deferd_model::{FAILURE_EXIT_CODE, TaskId, TaskRecord, TaskStatus, TransitionError};
use tokio::{
    runtime::Handle,
    task::{JoinError, JoinHandle},
    time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use crate::{
    engine::Engine,
    events::{EventKind, TaskEvent},
    registry::{Cancel, ClaimError},
    runner::{RunOutput, RunnerError},
};

/// How a task's executor finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Executed,
    Failed,
    /// Canceled by a delete request.
    Canceled,
    /// Force-canceled by the safety timeout.
    TimedOut,
}

impl Outcome {
    fn from_status(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Executed => Outcome::Executed,
            TaskStatus::Failed => Outcome::Failed,
            TaskStatus::Scheduled | TaskStatus::Canceled => Outcome::Canceled,
        }
    }
}

/// Handle to a running executor. Dropping it detaches the executor.
#[derive(Debug)]
pub struct ExecutionHandle {
    id: TaskId,
    join: JoinHandle<Outcome>,
}

impl ExecutionHandle {
    #[inline]
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the executor to finish.
    pub async fn outcome(self) -> Result<Outcome, JoinError> {
        self.join.await
    }
}

pub(crate) struct DelayedExecutor {
    engine: Arc<Engine>,
    id: TaskId,
    delay: Duration,
    deadline: Duration,
    cancel: CancellationToken,
}

impl DelayedExecutor {
    pub(crate) fn new(engine: Arc<Engine>, record: &TaskRecord, cancel: CancellationToken) -> Self {
        let delay = Duration::from_secs(u64::try_from(record.task.run_after_seconds).unwrap_or(0));
        let deadline = engine.config.safety_deadline(delay);
        Self {
            engine,
            id: record.id.clone(),
            delay,
            deadline,
            cancel,
        }
    }

    pub(crate) fn spawn(self) -> ExecutionHandle {
        let id = self.id.clone();
        let join = tokio::spawn(self.run());
        ExecutionHandle { id, join }
    }

    #[instrument(level = "debug", skip(self), fields(task = %self.id))]
    async fn run(self) -> Outcome {
        let _guard = AbandonOnPanic {
            engine: Arc::clone(&self.engine),
            id: self.id.clone(),
        };
        let start = Instant::now();

        // Order matters: an observed cancellation beats everything, and the delay wins a tie
        // with the safety deadline.
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!("cancellation observed before the delay elapsed");
                Outcome::Canceled
            }
            _ = sleep_until_opt(start.checked_add(self.delay)) => self.fire().await,
            _ = sleep_until_opt(start.checked_add(self.deadline)) => self.time_out().await,
        }
    }

    async fn fire(&self) -> Outcome {
        let mut record = match self.engine.registry.claim(self.id.as_str()) {
            Ok(record) => record,
            Err(ClaimError::NotScheduled(status)) => {
                debug!(%status, "task left scheduled before its delay elapsed; skipping");
                return Outcome::from_status(status);
            }
            Err(e) => {
                warn!(error = %e, "cannot claim task for execution");
                return Outcome::Canceled;
            }
        };

        let runner = &self.engine.runner;
        debug!(command = %record.task.command, runner = runner.name(), "running command");
        let result = runner.run(&record.task.command).await;

        let (outcome, event) = match apply(&mut record, result) {
            Ok(done) => done,
            Err(e) => {
                error!(error = %e, "claimed task could not be completed");
                return self.abandon(&format!("result could not be applied: {e}")).await;
            }
        };
        if let Err(e) = self.engine.registry.reconcile(record.clone()) {
            error!(error = %e, "failed to reconcile finished task");
            return self.abandon(&format!("result could not be stored: {e}")).await;
        }
        self.engine.settle(record, event).await;
        outcome
    }

    /// Fail a task this executor cannot finish normally so its slot is released.
    async fn abandon(&self, reason: &str) -> Outcome {
        match self.engine.registry.abandon(self.id.as_str(), reason) {
            Some(record) => {
                let event = abandoned_event(&record, reason);
                self.engine.settle(record, event).await;
                Outcome::Failed
            }
            None => self
                .engine
                .registry
                .get(self.id.as_str())
                .map_or(Outcome::Canceled, |record| Outcome::from_status(record.status)),
        }
    }

    async fn time_out(&self) -> Outcome {
        match self.engine.registry.cancel(self.id.as_str()) {
            Cancel::Canceled(record) => {
                let secs = self.deadline.as_secs();
                warn!(timeout_secs = secs, "task canceled due to timeout");
                let event = TaskEvent::new(EventKind::TimedOut)
                    .with_task(&record.id)
                    .with_reason(format!("canceled due to timeout after {secs}s"));
                self.engine.settle(record, event).await;
                Outcome::TimedOut
            }
            Cancel::AlreadyCanceled(_) => Outcome::Canceled,
            Cancel::Conflict(record) => Outcome::from_status(record.status),
            Cancel::NotFound => {
                warn!("task vanished before the safety timeout");
                Outcome::Canceled
            }
        }
    }
}

/// Sleep until `at`. A deadline beyond the clock's range never arrives.
async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => future::pending().await,
    }
}

fn abandoned_event(record: &TaskRecord, reason: &str) -> TaskEvent {
    TaskEvent::new(EventKind::Failed)
        .with_task(&record.id)
        .with_reason(reason)
}

/// Fails the task if its executor unwinds before recording a result.
///
/// Not triggered by an ordinary drop: executors dropped at runtime shutdown leave their
/// tasks `scheduled`, as a restart would.
struct AbandonOnPanic {
    engine: Arc<Engine>,
    id: TaskId,
}

impl Drop for AbandonOnPanic {
    fn drop(&mut self) {
        if !thread::panicking() {
            return;
        }
        let reason = "executor panicked before recording a result";
        let Some(record) = self.engine.registry.abandon(self.id.as_str(), reason) else {
            return;
        };
        error!(task = %self.id, "executor panicked; task marked failed");

        let event = abandoned_event(&record, reason);
        match Handle::try_current() {
            Ok(handle) => {
                let engine = Arc::clone(&self.engine);
                handle.spawn(async move { engine.settle(record, event).await });
            }
            Err(_) => self.engine.emit(event),
        }
    }
}

/// Apply the runner result to the executor's working copy.
fn apply(
    record: &mut TaskRecord,
    result: Result<RunOutput, RunnerError>,
) -> Result<(Outcome, TaskEvent), TransitionError> {
    match result {
        Ok(out) if out.success() => {
            record.mark_executed(out.stdout)?;
            let event = TaskEvent::new(EventKind::Executed).with_task(&record.id);
            Ok((Outcome::Executed, event))
        }
        Ok(out) => {
            let mut reason = match out.exit_code {
                Some(code) => format!("exit code: {code}"),
                None => "terminated by signal".to_string(),
            };
            let stderr = out.stderr.trim();
            if !stderr.is_empty() {
                reason = format!("{reason}: {stderr}");
            }
            record.mark_failed(
                out.exit_code.unwrap_or(FAILURE_EXIT_CODE),
                out.stdout,
                reason.clone(),
            )?;
            let event = TaskEvent::new(EventKind::Failed)
                .with_task(&record.id)
                .with_reason(reason);
            Ok((Outcome::Failed, event))
        }
        Err(e) => {
            let reason = e.to_string();
            record.mark_failed(FAILURE_EXIT_CODE, String::new(), reason.clone())?;
            let event = TaskEvent::new(EventKind::Failed)
                .with_task(&record.id)
                .with_reason(reason);
            Ok((Outcome::Failed, event))
        }
    }
}

#[cfg(test)]
mod tests {
    use deferd_model::Task;

    use super::*;

    fn scheduled() -> TaskRecord {
        TaskRecord::scheduled(TaskId::from("exec0001"), Task::new("ls /nope", 1))
    }

    #[test]
    fn success_keeps_stdout() {
        let mut record = scheduled();
        let out = RunOutput {
            stdout: "a\nb\n".into(),
            stderr: String::new(),
            exit_code: Some(0),
        };
        let (outcome, event) = apply(&mut record, Ok(out)).unwrap();
        assert_eq!(outcome, Outcome::Executed);
        assert_eq!(event.kind, EventKind::Executed);
        assert_eq!(record.stdout, "a\nb\n");
    }

    #[test]
    fn non_zero_exit_is_failure_with_stderr() {
        let mut record = scheduled();
        let out = RunOutput {
            stdout: String::new(),
            stderr: "ls: cannot access '/nope'\n".into(),
            exit_code: Some(2),
        };
        let (outcome, _) = apply(&mut record, Ok(out)).unwrap();
        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.exit_code, 2);
        assert_eq!(
            record.stderr.as_deref(),
            Some("exit code: 2: ls: cannot access '/nope'")
        );
    }

    #[test]
    fn signal_uses_sentinel_exit_code() {
        let mut record = scheduled();
        let out = RunOutput {
            exit_code: None,
            ..Default::default()
        };
        apply(&mut record, Ok(out)).unwrap();
        assert_eq!(record.exit_code, FAILURE_EXIT_CODE);
        assert_eq!(record.stderr.as_deref(), Some("terminated by signal"));
    }

    #[test]
    fn runner_error_is_captured() {
        let mut record = scheduled();
        let (outcome, event) =
            apply(&mut record, Err(RunnerError::Spawn("sh: not found".into()))).unwrap();
        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(event.reason.as_deref(), Some("spawn failed: sh: not found"));
        assert_eq!(record.exit_code, FAILURE_EXIT_CODE);
    }
}
