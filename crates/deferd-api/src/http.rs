use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use deferd_model::{Task, TaskId, TaskSeconds, TaskStatus};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::ApiError, handler::ApiHandler};

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
}

impl<H> HttpApi<H>
where
    H: ApiHandler,
{
    /// Create new HTTP API with the given handler.
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Routes:
    /// - POST /tasks - Submit task
    /// - GET /tasks - List tasks (`?status=` filter)
    /// - GET /tasks/{id} - Get one task
    /// - DELETE /tasks/{id} - Cancel a task that has not run
    /// - GET /history - Finished tasks in completion order
    pub fn router(self) -> Router {
        Router::new()
            .route("/tasks", get(list_tasks::<H>).post(submit_task::<H>))
            .route("/tasks/{id}", get(get_task::<H>).delete(cancel_task::<H>))
            .route("/history", get(history::<H>))
            .with_state(self.handler)
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct SubmitTaskResponse {
    id: TaskId,
    command: String,
    run_after_seconds: TaskSeconds,
    status: TaskStatus,
}

#[derive(Debug, Deserialize)]
struct ListTasksParams {
    /// Filter by task status
    status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CancelTaskResponse {
    id: TaskId,
    status: TaskStatus,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /tasks
///
/// The body is decoded here rather than by an extractor so that undecodable submissions can
/// be recorded before answering 400.
async fn submit_task<H>(
    State(handler): State<Arc<H>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let task: Task = match serde_json::from_slice(&body) {
        Ok(task) => task,
        Err(e) => {
            let reason = e.to_string();
            let record = handler.record_malformed(&reason).await?;
            return Err(ApiError::Malformed {
                id: record.id,
                reason,
            });
        }
    };

    debug!(command = %task.command, delay = task.run_after_seconds, "submitting task");
    let record = handler.submit_task(task).await?;

    let response = SubmitTaskResponse {
        id: record.id,
        command: record.task.command,
        run_after_seconds: record.task.run_after_seconds,
        status: record.status,
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /tasks
async fn list_tasks<H>(
    State(handler): State<Arc<H>>,
    Query(params): Query<ListTasksParams>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let status = params
        .status
        .map(|s| s.parse::<TaskStatus>())
        .transpose()
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

    let tasks = handler.list_tasks(status).await?;
    debug!(count = tasks.len(), "tasks listed");
    Ok(Json(tasks))
}

/// GET /tasks/{id}
async fn get_task<H>(
    State(handler): State<Arc<H>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let task_id = TaskId::from(id);
    match handler.get_task(&task_id).await? {
        Some(record) => Ok(Json(record)),
        None => Err(ApiError::TaskNotFound(task_id.to_string())),
    }
}

/// DELETE /tasks/{id}
async fn cancel_task<H>(
    State(handler): State<Arc<H>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    if id.trim().is_empty() {
        return Err(ApiError::InvalidRequest("task id cannot be empty".into()));
    }

    let task_id = TaskId::from(id);
    let record = handler.cancel_task(&task_id).await?;
    debug!(%task_id, "task canceled");

    Ok(Json(CancelTaskResponse {
        id: record.id,
        status: record.status,
    }))
}

/// GET /history
async fn history<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    Ok(Json(handler.history().await?))
}
