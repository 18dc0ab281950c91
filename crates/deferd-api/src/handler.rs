use async_trait::async_trait;
use deferd_model::{Task, TaskId, TaskRecord, TaskStatus};

use crate::error::ApiError;

/// Backend behind the HTTP routes.
///
/// [`SchedulerApiAdapter`](crate::SchedulerApiAdapter) serves a local scheduler; other
/// implementations can wrap it with auth or forwarding.
#[async_trait]
pub trait ApiHandler: Send + Sync + 'static {
    /// Validate and schedule a task. Returns the record as accepted.
    async fn submit_task(&self, task: Task) -> Result<TaskRecord, ApiError>;

    /// Audit a submission whose body could not be decoded.
    async fn record_malformed(&self, reason: &str) -> Result<TaskRecord, ApiError>;

    async fn get_task(&self, id: &TaskId) -> Result<Option<TaskRecord>, ApiError>;

    /// All known tasks in submission order, optionally filtered by status.
    async fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<TaskRecord>, ApiError>;

    async fn history(&self) -> Result<Vec<TaskRecord>, ApiError>;

    /// Cancel a task that has not run yet. Idempotent for already canceled tasks.
    async fn cancel_task(&self, id: &TaskId) -> Result<TaskRecord, ApiError>;
}
