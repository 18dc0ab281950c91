//! Public facade over the engine: submit, look up and cancel tasks.

use std::sync::Arc;

use deferd_model::{Task, TaskId, TaskRecord, TaskStatus};
use tracing::{debug, instrument};

use crate::{
    config::SchedulerConfig,
    engine::Engine,
    error::CoreError,
    events::{EventKind, Subscribe, TaskEvent},
    executor::{DelayedExecutor, ExecutionHandle},
    registry::Cancel,
    runner::CommandRunner,
    validate::validate_task,
};

/// An accepted submission.
#[derive(Debug)]
pub struct Submission {
    /// The record as inserted, still `scheduled`.
    pub record: TaskRecord,
    /// The task's executor.
    pub handle: ExecutionHandle,
}

/// Successful answer to a cancellation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// This request moved the task to `canceled`.
    Canceled(TaskRecord),
    /// The task was canceled before; nothing changed.
    AlreadyCanceled(TaskRecord),
}

impl CancelOutcome {
    pub fn record(&self) -> &TaskRecord {
        match self {
            CancelOutcome::Canceled(r) | CancelOutcome::AlreadyCanceled(r) => r,
        }
    }
}

/// Entry point of the engine: submission, lookup and cancellation.
#[derive(Clone)]
pub struct Scheduler {
    engine: Arc<Engine>,
}

impl Scheduler {
    pub async fn new(
        config: SchedulerConfig,
        runner: Arc<dyn CommandRunner>,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Result<Self, CoreError> {
        let engine = Engine::open(config, runner, subscribers).await?;
        Ok(Self {
            engine: Arc::new(engine),
        })
    }

    /// Validate, admit and schedule a task.
    ///
    /// Rejections (validation or overflow) have no side effects besides the event.
    #[instrument(level = "debug", skip(self, task), fields(command = %task.command, delay = task.run_after_seconds))]
    pub async fn submit(&self, task: Task) -> Result<Submission, CoreError> {
        let engine = &self.engine;

        if let Err(e) = validate_task(&task, &engine.config.whitelist, engine.config.max_delay()) {
            engine.emit(TaskEvent::new(EventKind::Rejected).with_reason(e.to_string()));
            return Err(e.into());
        }

        let permit = match engine.admission.try_admit() {
            Ok(permit) => permit,
            Err(e) => {
                engine.emit(TaskEvent::new(EventKind::Overflow).with_reason(e.to_string()));
                return Err(e.into());
            }
        };

        let (record, cancel) = engine.registry.insert_scheduled(&engine.ids, task, permit);
        engine.emit(
            TaskEvent::new(EventKind::Scheduled)
                .with_task(&record.id)
                .with_reason(record.task.command.clone()),
        );

        let handle = DelayedExecutor::new(Arc::clone(engine), &record, cancel).spawn();
        engine.persist_tasks().await;

        debug!(task = %record.id, "task scheduled");
        Ok(Submission { record, handle })
    }

    /// Record a submission whose body could not be decoded as a synthetic failed entry.
    pub async fn record_malformed(&self, reason: &str) -> TaskRecord {
        let engine = &self.engine;
        let record = engine.registry.insert_malformed(&engine.ids, reason);
        let event = TaskEvent::new(EventKind::Malformed)
            .with_task(&record.id)
            .with_reason(reason);
        engine.settle(record.clone(), event).await;
        record
    }

    /// Cancel a task that has not started running.
    ///
    /// Canceling an already canceled task succeeds without changes; a task that already ran
    /// (or whose executor has claimed it) is a conflict and is left untouched. Tasks known
    /// only from the history of a previous run answer the same way.
    #[instrument(level = "debug", skip(self))]
    pub async fn cancel(&self, id: &str) -> Result<CancelOutcome, CoreError> {
        let engine = &self.engine;
        match engine.registry.cancel(id) {
            Cancel::Canceled(record) => {
                let event = TaskEvent::new(EventKind::Canceled)
                    .with_task(&record.id)
                    .with_reason("canceled by request");
                engine.settle(record.clone(), event).await;
                Ok(CancelOutcome::Canceled(record))
            }
            Cancel::AlreadyCanceled(record) => Ok(CancelOutcome::AlreadyCanceled(record)),
            Cancel::Conflict(record) => Err(CoreError::AlreadyExecuted(record.id)),
            Cancel::NotFound => match engine.history.find(id).await {
                Some(record) if record.status == TaskStatus::Canceled => {
                    Ok(CancelOutcome::AlreadyCanceled(record))
                }
                Some(record) => Err(CoreError::AlreadyExecuted(record.id)),
                None => Err(CoreError::NotFound(TaskId::from(id))),
            },
        }
    }

    /// Record held by this run's registry.
    pub fn get(&self, id: &str) -> Option<TaskRecord> {
        self.engine.registry.get(id)
    }

    /// Like [`Self::get`], falling back to the history so finished tasks of a previous run
    /// stay addressable.
    pub async fn lookup(&self, id: &str) -> Option<TaskRecord> {
        match self.engine.registry.get(id) {
            Some(record) => Some(record),
            None => self.engine.history.find(id).await,
        }
    }

    pub fn list(&self) -> Vec<TaskRecord> {
        self.engine.registry.list_all()
    }

    pub fn list_by_status(&self, status: TaskStatus) -> Vec<TaskRecord> {
        self.engine.registry.list_by_status(status)
    }

    pub async fn history(&self) -> Vec<TaskRecord> {
        self.engine.history.list().await
    }

    /// Tasks currently holding an admission slot.
    pub fn in_flight(&self) -> usize {
        self.engine.admission.in_flight()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.engine.config
    }
}
