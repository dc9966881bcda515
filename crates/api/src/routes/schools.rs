use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use types::{SchoolDataset, SchoolId, StreamId, SubjectId, TeacherId, Template, TemplateId};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::state::{AppState, Caller};

#[derive(Serialize, ToSchema)]
pub struct Imported {
    pub school_id: SchoolId,
    pub subjects: usize,
    pub teachers: usize,
    pub streams: usize,
}

#[utoipa::path(
    post,
    path = "/v1/schools",
    request_body = SchoolDataset,
    responses(
        (status = 201, description = "School imported", body = Imported),
        (status = 409, description = "An id belongs to another school or the template differs from the stored one"),
        (status = 422, description = "Dataset failed validation")
    )
)]
pub async fn import(
    State(state): State<AppState>,
    Json(ds): Json<SchoolDataset>,
) -> Result<(StatusCode, Json<Imported>), ApiError> {
    let out = Imported {
        school_id: ds.school.id.clone(),
        subjects: ds.subjects.len(),
        teachers: ds.teachers.len(),
        streams: ds.streams.len(),
    };
    state.store.import(ds)?;
    Ok((StatusCode::CREATED, Json(out)))
}

#[utoipa::path(
    post,
    path = "/v1/templates",
    request_body = Template,
    responses(
        (status = 200, description = "Template stored", body = TemplateId),
        (status = 403, description = "Caller is not an admin"),
        (status = 422, description = "Template failed validation")
    )
)]
pub async fn upsert_template(
    State(state): State<AppState>,
    caller: Caller,
    Json(template): Json<Template>,
) -> Result<Json<TemplateId>, ApiError> {
    if !caller.is_admin() {
        return Err(ApiError::forbidden());
    }
    let id = template.id.clone();
    state.store.upsert_template(template)?;
    Ok(Json(id))
}

#[utoipa::path(
    delete,
    path = "/v1/schools/{id}",
    params(("id" = String, Path, description = "School ID")),
    responses((status = 204, description = "School and everything it owns removed"), (status = 404, description = "Not found"))
)]
pub async fn delete_school(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_school(&SchoolId(id))?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/v1/teachers/{id}",
    params(("id" = String, Path, description = "Teacher ID")),
    responses((status = 204, description = "Teacher removed"), (status = 404, description = "Not found"))
)]
pub async fn delete_teacher(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_teacher(&TeacherId(id))?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/v1/subjects/{id}",
    params(("id" = String, Path, description = "Subject ID")),
    responses((status = 204, description = "Subject removed"), (status = 404, description = "Not found"))
)]
pub async fn delete_subject(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_subject(&SubjectId(id))?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/v1/streams/{id}",
    params(("id" = String, Path, description = "Stream ID")),
    responses((status = 204, description = "Stream and its timetables removed"), (status = 404, description = "Not found"))
)]
pub async fn delete_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_stream(&StreamId(id))?;
    Ok(StatusCode::NO_CONTENT)
}
