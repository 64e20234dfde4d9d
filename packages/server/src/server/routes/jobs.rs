//! Job and task read endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::server::app::AppState;

/// `GET /jobs`: all jobs, newest first.
pub async fn list_jobs_handler(State(state): State<AppState>) -> Response {
    match state.job_store.list_all().await {
        Ok(jobs) => Json(jobs).into_response(),
        Err(e) => {
            error!(error = %e, "failed to list jobs");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "failed to list jobs" })),
            )
                .into_response()
        }
    }
}

/// `GET /jobs/:job_id/tasks`: the job's tasks in pipeline order.
pub async fn job_tasks_handler(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Response {
    // Distinguish "no such job" from "job with tasks pending".
    if let Err(e) = state.job_store.get(job_id).await {
        if e.is_not_found() {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "job not found" })),
            )
                .into_response();
        }
        error!(job_id = %job_id, error = %e, "failed to load job");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "failed to load job" })),
        )
            .into_response();
    }

    match state.task_store.get_all_for_job(job_id).await {
        Ok(tasks) => Json(tasks).into_response(),
        Err(e) => {
            error!(job_id = %job_id, error = %e, "failed to load tasks");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "failed to load tasks" })),
            )
                .into_response()
        }
    }
}
