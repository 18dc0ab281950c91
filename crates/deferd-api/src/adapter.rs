use async_trait::async_trait;
use deferd_core::Scheduler;
use deferd_model::{Task, TaskId, TaskRecord, TaskStatus};

use crate::error::ApiError;
use crate::handler::ApiHandler;

/// Adapter that bridges [`Scheduler`] to `ApiHandler`.
///
/// Executors spawned by submissions are detached, so a submit answers as soon as the task is
/// scheduled. How it ended, including a cancellation by the safety timeout, is observed
/// by polling `GET /tasks/{id}` or reading the history. Ids finished in a previous run are
/// answered from the history.
pub struct SchedulerApiAdapter {
    scheduler: Scheduler,
}

impl SchedulerApiAdapter {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl ApiHandler for SchedulerApiAdapter {
    async fn submit_task(&self, task: Task) -> Result<TaskRecord, ApiError> {
        let submission = self.scheduler.submit(task).await?;
        Ok(submission.record)
    }

    async fn record_malformed(&self, reason: &str) -> Result<TaskRecord, ApiError> {
        Ok(self.scheduler.record_malformed(reason).await)
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<TaskRecord>, ApiError> {
        Ok(self.scheduler.lookup(id.as_str()).await)
    }

    async fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<TaskRecord>, ApiError> {
        Ok(match status {
            Some(status) => self.scheduler.list_by_status(status),
            None => self.scheduler.list(),
        })
    }

    async fn history(&self) -> Result<Vec<TaskRecord>, ApiError> {
        Ok(self.scheduler.history().await)
    }

    async fn cancel_task(&self, id: &TaskId) -> Result<TaskRecord, ApiError> {
        let outcome = self.scheduler.cancel(id.as_str()).await?;
        Ok(outcome.record().clone())
    }
}
