use axum::{
    extract::{Path, State},
    Json,
};
use sched_core::scoring::{compute_quality, QualityWeights};
use sched_core::store::Store;
use sched_core::ScheduleError;
use serde::Serialize;
use std::collections::HashMap;
use types::SchoolId;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct ExplainOut {
    pub objective: f64,
    pub weights: Weights,
    pub counts: Counts,
}

#[derive(Serialize, ToSchema)]
pub struct Weights {
    pub back_to_back: i32,
    pub workload_spread: i32,
    pub distribution_range: i32,
}

#[derive(Serialize, ToSchema)]
pub struct Counts {
    pub timetables: usize,
    pub back_to_back_total: i64,
    pub back_to_back_streams: HashMap<String, i64>,
    pub workload_spread: i64,
    pub distribution_range_total: i64,
    pub distribution_range_streams: HashMap<String, i64>,
}

#[utoipa::path(
    get,
    path = "/v1/schools/{id}/explain",
    params(("id" = String, Path, description = "School ID")),
    responses(
        (status = 200, description = "Quality breakdown of the school's latest timetables", body = ExplainOut),
        (status = 404, description = "Unknown school")
    )
)]
pub async fn explain(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ExplainOut>, ApiError> {
    let school = SchoolId(id);
    if state.store.school(&school).await.map_err(ScheduleError::from)?.is_none() {
        return Err(ScheduleError::not_found("school", &school).into());
    }
    let latest = state
        .store
        .timetables(&school, false)
        .await
        .map_err(ScheduleError::from)?;
    let w = QualityWeights::default();
    let s = compute_quality(&latest, w);
    Ok(Json(ExplainOut {
        objective: s.objective,
        weights: Weights {
            back_to_back: w.back_to_back,
            workload_spread: w.workload_spread,
            distribution_range: w.distribution_range,
        },
        counts: Counts {
            timetables: latest.len(),
            back_to_back_total: s.back_to_back_total,
            back_to_back_streams: s.back_to_back_streams,
            workload_spread: s.workload_spread,
            distribution_range_total: s.distribution_range_total,
            distribution_range_streams: s.distribution_range_streams,
        },
    }))
}
