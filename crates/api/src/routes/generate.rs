use axum::{extract::State, http::StatusCode, Json};
use jobs::Enqueued;
use serde::{Deserialize, Serialize};
use types::{GenerateRequest, SchoolId, StreamId};
use utoipa::ToSchema;

use crate::state::{AppState, Caller};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateIn {
    pub school_id: SchoolId,
    #[serde(default)]
    pub streams: Option<Vec<StreamId>>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobCreated {
    pub job_id: String,
    pub status: &'static str,
}

/// Queues a generation run. A school with a run already queued or running
/// gets that run's id back.
#[utoipa::path(
    post,
    path = "/v1/generate",
    request_body = GenerateIn,
    responses(
        (status = 202, description = "Run queued", body = JobCreated),
        (status = 200, description = "A run for this school is already active", body = JobCreated)
    )
)]
pub async fn generate(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<GenerateIn>,
) -> (StatusCode, Json<JobCreated>) {
    let req = GenerateRequest {
        school_id: input.school_id,
        streams: input.streams,
        requested_by: caller.user_id,
    };
    match state.jobs.enqueue(req) {
        Enqueued::Started(id) => (
            StatusCode::ACCEPTED,
            Json(JobCreated {
                job_id: id.0,
                status: "queued",
            }),
        ),
        Enqueued::AlreadyActive(id) => (
            StatusCode::OK,
            Json(JobCreated {
                job_id: id.0,
                status: "active",
            }),
        ),
    }
}
