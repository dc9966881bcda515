mod config;
mod error;
mod state;
mod telemetry;
pub mod routes {
    pub mod explain;
    pub mod generate;
    pub mod health;
    pub mod jobs;
    pub mod schema;
    pub mod schools;
    pub mod timetables;
    pub mod validate;
}

use anyhow::Context;
use axum::{
    routing::{delete, get, post},
    Router,
};
use sched_core::store::MemStore;
use std::path::Path;
use std::sync::Arc;
use types::SchoolDataset;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
        paths(
            routes::health::health,
            routes::generate::generate,
            routes::jobs::status,
            routes::jobs::result,
            routes::schools::import,
            routes::schools::upsert_template,
            routes::schools::delete_school,
            routes::schools::delete_teacher,
            routes::schools::delete_subject,
            routes::schools::delete_stream,
            routes::timetables::list,
            routes::timetables::get_one,
            routes::timetables::admin_all,
            routes::explain::explain,
            routes::validate::validate_handler,
            routes::schema::dataset_schema,
        ),
        components(schemas(
            types::SchoolDataset, types::School, types::SchoolType, types::Template,
            types::Break, types::StructureConfig, types::Subject, types::Teacher,
            types::Availability, types::Stream, types::SubjectRequirement, types::DayOfWeek,
            types::TimetableRow, types::RunSummary, types::StreamReport, types::StreamState,
            types::InfeasibleReason, types::Slot,
            types::SchoolId, types::TeacherId, types::SubjectId, types::StreamId,
            types::TemplateId, types::TimetableId,
            jobs::JobId, jobs::JobStatus,
            error::ErrorBody,
            routes::health::Health,
            routes::generate::GenerateIn,
            routes::generate::JobCreated,
            routes::schools::Imported,
            routes::timetables::TimetableView,
            routes::validate::ValidationReport,
            routes::explain::ExplainOut,
            routes::explain::Weights,
            routes::explain::Counts
        )),
        tags(
            (name = "timetabler", description = "School timetable generation API")
        )
    )]
struct ApiDoc;

fn app(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(routes::health::health))
        .route("/v1/generate", post(routes::generate::generate))
        .route("/v1/jobs/:id", get(routes::jobs::status))
        .route("/v1/jobs/:id/result", get(routes::jobs::result))
        .route("/v1/schools", post(routes::schools::import))
        .route("/v1/schools/:id", delete(routes::schools::delete_school))
        .route("/v1/schools/:id/timetables", get(routes::timetables::list))
        .route("/v1/schools/:id/explain", get(routes::explain::explain))
        .route("/v1/teachers/:id", delete(routes::schools::delete_teacher))
        .route("/v1/subjects/:id", delete(routes::schools::delete_subject))
        .route("/v1/streams/:id", delete(routes::schools::delete_stream))
        .route("/v1/templates", post(routes::schools::upsert_template))
        .route("/v1/timetables/:id", get(routes::timetables::get_one))
        .route("/v1/admin/timetables", get(routes::timetables::admin_all))
        .route("/v1/validate", post(routes::validate::validate_handler))
        .route("/v1/schema/dataset", get(routes::schema::dataset_schema))
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(telemetry::stack())
        .with_state(state)
}

async fn seed(store: &MemStore, path: &Path) -> anyhow::Result<usize> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading seed file {}", path.display()))?;
    let datasets: Vec<SchoolDataset> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing seed file {}", path.display()))?;
    let n = datasets.len();
    for ds in datasets {
        let id = ds.school.id.clone();
        store
            .import(ds)
            .with_context(|| format!("importing school {id}"))?;
    }
    Ok(n)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("loading configuration")?;
    telemetry::init(config.log_format);

    let store = Arc::new(MemStore::new());
    if let Some(path) = &config.seed_path {
        let n = seed(&store, path).await?;
        tracing::info!(schools = n, path = %path.display(), "seed data imported");
    }
    let app = app(AppState::new(store, config.scheduler));

    let addr = config.addr()?;
    tracing::info!(%addr, retry_factor = config.scheduler.retry_factor, "listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use http::{Request, StatusCode};
    use scheduler::SchedulerConfig;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    fn dataset() -> Value {
        json!({
            "school": {"id": "hilltop", "name": "Hilltop Primary"},
            "template": {
                "id": "lower-primary",
                "name": "Lower primary week",
                "periods_per_day": 4,
                "period_duration": 35,
                "days_per_week": 5,
                "start_time": "08:00",
                "end_time": "11:00",
                "break_config": [{"afterPeriod": 2, "duration": 20, "label": "Break"}]
            },
            "subjects": [
                {"id": "eng", "school_id": "hilltop", "name": "English"},
                {"id": "math", "school_id": "hilltop", "name": "Mathematics"}
            ],
            "teachers": [
                {"id": "t1", "school_id": "hilltop", "name": "Amina", "email": "amina@hilltop.test", "subjects": ["eng"]},
                {"id": "t2", "school_id": "hilltop", "name": "Brian", "email": "brian@hilltop.test", "subjects": ["math"]}
            ],
            "streams": [
                {"id": "g1-blue", "school_id": "hilltop", "grade": 1, "stream_name": "Blue"}
            ]
        })
    }

    fn test_app() -> Router {
        app(AppState::new(
            Arc::new(MemStore::new()),
            SchedulerConfig::default(),
        ))
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        let req = match body {
            Some(b) => req
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (status, body) = call(&test_app(), "GET", "/v1/health", &[], None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn import_generate_and_read_back() {
        let app = test_app();
        let (status, body) = call(&app, "POST", "/v1/schools", &[], Some(dataset())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["teachers"], 2);

        let (status, body) = call(
            &app,
            "POST",
            "/v1/generate",
            &[("x-user-id", "deputy-1")],
            Some(json!({"schoolId": "hilltop"})),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let job = body["jobId"].as_str().unwrap().to_string();

        let mut done = Value::Null;
        for _ in 0..200 {
            let (_, body) = call(&app, "GET", &format!("/v1/jobs/{job}"), &[], None).await;
            if body["status"] == "done" {
                done = body;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(done["result"]["streams"][0]["state"], "complete");

        let (status, summary) =
            call(&app, "GET", &format!("/v1/jobs/{job}/result"), &[], None).await;
        assert_eq!(status, StatusCode::OK);
        let tt_id = summary["streams"][0]["timetableId"].as_str().unwrap().to_string();

        let (status, rows) =
            call(&app, "GET", "/v1/schools/hilltop/timetables", &[], None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rows.as_array().unwrap().len(), 1);
        assert_eq!(rows[0]["generated_by"], "deputy-1");
        assert_eq!(rows[0]["is_latest"], true);
        assert_eq!(rows[0]["timetable_data"]["Monday"].as_array().unwrap().len(), 4);

        let (status, view) = call(&app, "GET", &format!("/v1/timetables/{tt_id}"), &[], None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["periods"][2]["kind"], "break");
        assert_eq!(view["periods"][2]["start"], "09:10");

        let (status, explain) = call(&app, "GET", "/v1/schools/hilltop/explain", &[], None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(explain["counts"]["timetables"], 1);
    }

    #[tokio::test]
    async fn admin_routes_need_the_admin_role() {
        let app = test_app();
        let (status, _) = call(&app, "GET", "/v1/admin/timetables", &[], None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = call(
            &app,
            "GET",
            "/v1/admin/timetables",
            &[("x-user-role", "admin")],
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let template = dataset()["template"].clone();
        let (status, _) = call(&app, "POST", "/v1/templates", &[], Some(template.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = call(
            &app,
            "POST",
            "/v1/templates",
            &[("x-user-role", "admin")],
            Some(template),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "lower-primary");
    }

    #[tokio::test]
    async fn validation_reports_every_problem() {
        let mut ds = dataset();
        ds["teachers"][0]["subjects"] = json!(["art"]);
        ds["streams"][0]["class_teacher"] = json!("ghost");
        let (status, body) = call(&test_app(), "POST", "/v1/validate", &[], Some(ds.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], false);
        assert_eq!(body["errors"].as_array().unwrap().len(), 2);

        let (status, body) = call(&test_app(), "POST", "/v1/schools", &[], Some(ds)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("missing subject art"));
    }

    #[tokio::test]
    async fn another_school_cannot_take_over_ids() {
        let app = test_app();
        call(&app, "POST", "/v1/schools", &[], Some(dataset())).await;

        let mut rival = dataset();
        rival["school"] = json!({"id": "riverside", "name": "Riverside Primary"});
        for table in ["subjects", "teachers", "streams"] {
            for row in rival[table].as_array_mut().unwrap() {
                row["school_id"] = json!("riverside");
            }
        }
        let (status, body) = call(&app, "POST", "/v1/schools", &[], Some(rival)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("teacher t1 belongs to school hilltop"));

        let (_, explain) = call(&app, "GET", "/v1/schools/hilltop/explain", &[], None).await;
        assert_eq!(explain["counts"]["timetables"], 0);
        let (status, _) = call(&app, "GET", "/v1/schools/riverside/explain", &[], None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_things_are_not_found() {
        let app = test_app();
        let (status, _) = call(&app, "GET", "/v1/schools/nope/timetables", &[], None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, "DELETE", "/v1/streams/nope", &[], None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, body) = call(&app, "GET", "/v1/jobs/nope", &[], None).await;
        assert_eq!(body["status"], "not_found");
        let (status, _) = call(&app, "GET", "/v1/jobs/nope/result", &[], None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn deleting_a_school_removes_its_timetables() {
        let app = test_app();
        call(&app, "POST", "/v1/schools", &[], Some(dataset())).await;
        let (status, _) = call(&app, "DELETE", "/v1/schools/hilltop", &[], None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, "GET", "/v1/schools/hilltop/explain", &[], None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn dataset_schema_is_served() {
        let (status, body) = call(&test_app(), "GET", "/v1/schema/dataset", &[], None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "SchoolDataset");
    }
}
