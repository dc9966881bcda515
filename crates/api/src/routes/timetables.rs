use axum::{
    extract::{Path, Query, State},
    Json,
};
use sched_core::store::Store;
use sched_core::template::{period_windows, DayEntry};
use sched_core::ScheduleError;
use serde::{Deserialize, Serialize};
use types::{SchoolId, TimetableId, TimetableRow};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::state::{AppState, Caller};

#[derive(Deserialize, IntoParams)]
pub struct ListParams {
    /// Include superseded timetables.
    #[serde(default)]
    pub history: bool,
}

#[derive(Serialize, ToSchema)]
pub struct TimetableView {
    #[serde(flatten)]
    pub row: TimetableRow,
    #[schema(value_type = Vec<Object>)]
    pub periods: Vec<DayEntry>,
}

#[utoipa::path(
    get,
    path = "/v1/schools/{id}/timetables",
    params(("id" = String, Path, description = "School ID"), ListParams),
    responses((status = 200, description = "Timetable rows", body = [TimetableRow]), (status = 404, description = "Not found"))
)]
pub async fn list(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<TimetableRow>>, ApiError> {
    let school = SchoolId(id);
    if state.store.school(&school).await.map_err(ScheduleError::from)?.is_none() {
        return Err(ScheduleError::not_found("school", &school).into());
    }
    let rows = state
        .store
        .timetables(&school, params.history)
        .await
        .map_err(ScheduleError::from)?;
    Ok(Json(rows.iter().map(|tt| tt.to_row()).collect()))
}

#[utoipa::path(
    get,
    path = "/v1/timetables/{id}",
    params(("id" = String, Path, description = "Timetable ID")),
    responses((status = 200, description = "Timetable with its period clock", body = TimetableView), (status = 404, description = "Not found"))
)]
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TimetableView>, ApiError> {
    let id = TimetableId(id);
    let tt = state
        .store
        .timetable(&id)
        .await
        .map_err(ScheduleError::from)?
        .ok_or_else(|| ScheduleError::not_found("timetable", &id))?;
    let periods = period_windows(&tt.template)?;
    Ok(Json(TimetableView {
        row: tt.to_row(),
        periods,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/admin/timetables",
    responses(
        (status = 200, description = "Latest timetable of every stream in every school", body = [TimetableRow]),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn admin_all(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<TimetableRow>>, ApiError> {
    if !caller.is_admin() {
        return Err(ApiError::forbidden());
    }
    Ok(Json(state.store.all_latest().iter().map(|tt| tt.to_row()).collect()))
}
