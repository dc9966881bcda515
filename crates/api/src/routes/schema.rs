use axum::Json;
use schemars::schema_for;
use serde_json::Value;
use types::SchoolDataset;

#[utoipa::path(
    get,
    path = "/v1/schema/dataset",
    responses((status = 200, description = "JSON schema of the school import payload"))
)]
pub async fn dataset_schema() -> Json<Value> {
    Json(serde_json::to_value(schema_for!(SchoolDataset)).unwrap_or(Value::Null))
}
