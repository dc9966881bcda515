use axum::{extract::State, Json};
use sched_core::store::Store;
use sched_core::{validate_dataset, DatasetError};
use serde::Serialize;
use types::SchoolDataset;

use crate::state::AppState;

#[derive(Serialize, utoipa::ToSchema)]
pub struct ValidationReport {
    pub ok: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Checks a dataset without importing it. A dataset without its own template
/// is checked against the stored template it selects.
#[utoipa::path(
    post,
    path = "/v1/validate",
    request_body = SchoolDataset,
    responses(
        (status = 200, description = "Validation result", body = ValidationReport)
    )
)]
pub async fn validate_handler(
    State(state): State<AppState>,
    Json(ds): Json<SchoolDataset>,
) -> Json<ValidationReport> {
    let stored = match (&ds.template, &ds.school.template_id) {
        (None, Some(id)) => state.store.template(id).await.ok().flatten(),
        _ => None,
    };
    match validate_dataset(&ds, stored.as_ref()) {
        Ok(()) => Json(ValidationReport {
            ok: true,
            errors: vec![],
        }),
        Err(DatasetError::Invalid(errors)) => Json(ValidationReport { ok: false, errors }),
    }
}
