use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sched_core::{ScheduleError, StoreError};
use serde::Serialize;
use tracing::error;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "admin role required")
    }
}

impl From<ScheduleError> for ApiError {
    fn from(e: ScheduleError) -> Self {
        let status = match &e {
            ScheduleError::NotFound { .. } => StatusCode::NOT_FOUND,
            ScheduleError::IncompleteSetup { .. } | ScheduleError::InvalidInput(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ScheduleError::Infeasible { .. } | ScheduleError::Store(StoreError::Conflict(_)) => {
                StatusCode::CONFLICT
            }
            ScheduleError::Validation { .. } | ScheduleError::Store(_) => {
                error!(error = %e, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}
