use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use jobs::JobStatus;
use serde_json::{json, Value};
use types::RunSummary;

use crate::error::ApiError;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/v1/jobs/{id}",
    params(("id" = String, Path, description = "Job ID")),
    responses((status = 200, description = "Job status", body = JobStatus))
)]
pub async fn status(State(state): State<AppState>, Path(id): Path<String>) -> Json<Value> {
    Json(match state.jobs.get(&id) {
        None => json!({"status": "not_found"}),
        Some(s) => serde_json::to_value(s)
            .unwrap_or_else(|e| json!({"status": "failed", "message": e.to_string()})),
    })
}

#[utoipa::path(
    get,
    path = "/v1/jobs/{id}/result",
    params(("id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Run summary", body = RunSummary),
        (status = 404, description = "Unknown job"),
        (status = 409, description = "Run not finished or failed")
    )
)]
pub async fn result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RunSummary>, ApiError> {
    match state.jobs.get(&id) {
        Some(JobStatus::Done { result }) => Ok(Json(result)),
        Some(JobStatus::Failed { message }) => Err(ApiError::new(StatusCode::CONFLICT, message)),
        Some(_) => Err(ApiError::new(StatusCode::CONFLICT, "run not finished")),
        None => Err(ApiError::new(StatusCode::NOT_FOUND, format!("job {id} not found"))),
    }
}
