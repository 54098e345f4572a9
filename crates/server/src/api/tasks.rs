//! Worker-facing dispatch protocol on `/internal/task`.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use abacus_compute::SchedulerError;
use abacus_core::{Task, TaskResult};

use crate::state::AppState;

use super::{conflict, internal_error, not_found, require_json, ApiResult, MessageResponse};

/// GET /internal/task -- claim the next runnable task.
pub async fn task_claim(State(state): State<Arc<AppState>>) -> ApiResult<Json<Task>> {
    match state.scheduler.claim_next_task().await {
        Ok(task) => Ok(Json(task)),
        Err(e @ SchedulerError::NoTaskAvailable) => Err(not_found(e.to_string())),
        Err(e) => Err(internal_error(e)),
    }
}

/// POST /internal/task -- report a claimed task's result.
pub async fn task_result(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TaskResult>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let report = require_json(payload)?;
    let id = report.id;

    match state.scheduler.post_result(report).await {
        Ok(()) => Ok(MessageResponse::new(format!("result for task {} accepted", id))),
        Err(e @ SchedulerError::TaskNotFound(_)) => Err(not_found(e.to_string())),
        Err(e @ SchedulerError::TaskNotClaimed { .. }) => Err(conflict(e.to_string())),
        Err(e) => Err(internal_error(e)),
    }
}
