use thiserror::Error;
use types::InfeasibleReason;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("conflicting write: {0}")]
    Conflict(String),
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("school {school} is not ready for generation: add {missing} first")]
    IncompleteSetup { school: String, missing: &'static str },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("stream {stream} is infeasible: {reason}")]
    Infeasible {
        stream: String,
        reason: InfeasibleReason,
    },

    #[error("timetable for stream {stream} failed validation: {message}")]
    Validation { stream: String, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ScheduleError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        ScheduleError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
