//! Job submission: validate the URL, create the job and its task set,
//! and hand the work to a worker over the bus.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::kernel::bus;
use crate::kernel::jobs::{Job, Task};
use crate::kernel::messages::AnalyzeMessage;
use crate::server::app::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub url: String,
}

pub async fn analyze_handler(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Response {
    // Validation happens before any state mutation.
    let url = match analysis::validate(&request.url) {
        Ok(url) => url,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let job = Job::new(&url);
    if let Err(e) = state.job_store.create(job.clone()).await {
        error!(error = %e, "failed to create job");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "failed to create job" })),
        )
            .into_response();
    }

    // All four tasks, always, as one atomic batch.
    if let Err(e) = state.task_store.create_batch(Task::batch_for_job(job.id)).await {
        error!(job_id = %job.id, error = %e, "failed to create task batch");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "failed to create tasks" })),
        )
            .into_response();
    }

    if let Err(e) = bus::publish(&*state.publisher, &AnalyzeMessage::new(job.id)).await {
        error!(job_id = %job.id, error = %e, "failed to publish analyze message");
        return (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": "failed to enqueue analysis" })),
        )
            .into_response();
    }

    (StatusCode::ACCEPTED, Json(job)).into_response()
}
