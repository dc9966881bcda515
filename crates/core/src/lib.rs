pub mod availability;
pub mod busy;
pub mod constraints;
pub mod error;
pub mod grid;
pub mod plan;
pub mod scoring;
pub mod serialize;
pub mod store;
pub mod template;
pub mod validate;
pub mod working_set;

use async_trait::async_trait;

pub use error::{ScheduleError, StoreError};
pub use types::{GenerateRequest, RunSummary, SchoolDataset, Timetable};
pub use validate::{validate_dataset, DatasetError};

/// Runs a generation for one school and reports per-stream outcomes.
#[async_trait]
pub trait Generator: Send + Sync + 'static {
    async fn generate(&self, req: GenerateRequest) -> Result<RunSummary, ScheduleError>;
}
