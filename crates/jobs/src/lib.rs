use parking_lot::RwLock;
use sched_core::Generator;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};
use types::{GenerateRequest, RunSummary, SchoolId};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct JobId(pub String);

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Done { result: RunSummary },
    Failed { message: String },
}

impl JobStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Running)
    }
}

/// Finished jobs kept per school; older ones are dropped as new runs finish.
pub const DEFAULT_KEEP_FINISHED: usize = 16;

#[derive(Clone, Debug)]
struct Job {
    school: SchoolId,
    seq: u64,
    status: JobStatus,
}

#[derive(Default)]
struct Table {
    jobs: HashMap<String, Job>,
    next_seq: u64,
}

impl Table {
    fn finish(&mut self, id: &str, status: JobStatus, keep: usize) {
        let Some(job) = self.jobs.get_mut(id) else {
            return;
        };
        job.status = status;
        let school = job.school.clone();

        let mut finished: Vec<(u64, String)> = self
            .jobs
            .iter()
            .filter(|(_, j)| j.school == school && !j.status.is_active())
            .map(|(id, j)| (j.seq, id.clone()))
            .collect();
        if finished.len() <= keep {
            return;
        }
        finished.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        for (_, old) in finished.drain(keep..) {
            self.jobs.remove(&old);
        }
    }
}

/// What `enqueue` did: started a new run, or found one already going for the
/// same school.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Enqueued {
    Started(JobId),
    AlreadyActive(JobId),
}

impl Enqueued {
    pub fn id(&self) -> &JobId {
        match self {
            Enqueued::Started(id) | Enqueued::AlreadyActive(id) => id,
        }
    }
}

pub struct InMemJobs<G: Generator> {
    inner: Arc<RwLock<Table>>,
    generator: Arc<G>,
    keep_finished: usize,
}

impl<G: Generator> Clone for InMemJobs<G> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            generator: self.generator.clone(),
            keep_finished: self.keep_finished,
        }
    }
}

impl<G: Generator> InMemJobs<G> {
    pub fn new(generator: G) -> Self {
        Self::with_retention(generator, DEFAULT_KEEP_FINISHED)
    }

    pub fn with_retention(generator: G, keep_finished: usize) -> Self {
        Self {
            inner: Default::default(),
            generator: Arc::new(generator),
            keep_finished,
        }
    }

    /// Starts a run for `req.school_id` unless one is already queued or
    /// running for that school.
    pub fn enqueue(&self, req: GenerateRequest) -> Enqueued {
        let id = {
            let mut w = self.inner.write();
            if let Some((id, _)) = w
                .jobs
                .iter()
                .find(|(_, j)| j.school == req.school_id && j.status.is_active())
            {
                return Enqueued::AlreadyActive(JobId(id.clone()));
            }
            let id = Uuid::new_v4().to_string();
            let seq = w.next_seq;
            w.next_seq += 1;
            w.jobs.insert(
                id.clone(),
                Job {
                    school: req.school_id.clone(),
                    seq,
                    status: JobStatus::Queued,
                },
            );
            id
        };

        let map = self.inner.clone();
        let generator = self.generator.clone();
        let keep = self.keep_finished;
        let id_for_task = id.clone();

        tokio::spawn(async move {
            if let Some(job) = map.write().jobs.get_mut(&id_for_task) {
                job.status = JobStatus::Running;
            }
            let school = req.school_id.clone();
            match generator.generate(req).await {
                Ok(result) => {
                    info!(job = %id_for_task, %school, completed = result.completed(), "job done");
                    map.write().finish(&id_for_task, JobStatus::Done { result }, keep);
                }
                Err(e) => {
                    error!(job = %id_for_task, %school, error = %e, "job failed");
                    map.write().finish(
                        &id_for_task,
                        JobStatus::Failed {
                            message: e.to_string(),
                        },
                        keep,
                    );
                }
            }
        });

        Enqueued::Started(JobId(id))
    }

    pub fn get(&self, id: &str) -> Option<JobStatus> {
        self.inner.read().jobs.get(id).map(|j| j.status.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sched_core::ScheduleError;
    use chrono::Utc;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct Gate {
        open: Arc<Notify>,
    }

    #[async_trait]
    impl Generator for Gate {
        async fn generate(&self, req: GenerateRequest) -> Result<RunSummary, ScheduleError> {
            if req.school_id.0 == "missing" {
                return Err(ScheduleError::not_found("school", &req.school_id));
            }
            if !req.school_id.0.starts_with("quick") {
                self.open.notified().await;
            }
            Ok(RunSummary {
                school_id: req.school_id,
                started_at: Utc::now(),
                finished_at: Utc::now(),
                streams: vec![],
            })
        }
    }

    async fn wait_for(jobs: &InMemJobs<Gate>, id: &JobId) -> JobStatus {
        for _ in 0..200 {
            match jobs.get(&id.0) {
                Some(s) if !s.is_active() => return s,
                _ => tokio::time::sleep(Duration::from_millis(5)).await,
            }
        }
        panic!("job {} never finished", id.0);
    }

    #[tokio::test]
    async fn one_active_run_per_school() {
        let open = Arc::new(Notify::new());
        let jobs = InMemJobs::new(Gate { open: open.clone() });

        let first = jobs.enqueue(GenerateRequest::for_school("s1"));
        let again = jobs.enqueue(GenerateRequest::for_school("s1"));
        let other = jobs.enqueue(GenerateRequest::for_school("s2"));
        assert!(matches!(first, Enqueued::Started(_)));
        assert_eq!(again, Enqueued::AlreadyActive(first.id().clone()));
        assert_ne!(other.id(), first.id());

        tokio::time::sleep(Duration::from_millis(20)).await;
        open.notify_waiters();
        assert!(matches!(wait_for(&jobs, first.id()).await, JobStatus::Done { .. }));

        let next = jobs.enqueue(GenerateRequest::for_school("s1"));
        assert!(matches!(next, Enqueued::Started(_)));
        assert_ne!(next.id(), first.id());
    }

    #[tokio::test]
    async fn failures_are_reported() {
        let jobs = InMemJobs::new(Gate {
            open: Arc::new(Notify::new()),
        });
        let id = jobs.enqueue(GenerateRequest::for_school("missing"));
        match wait_for(&jobs, id.id()).await {
            JobStatus::Failed { message } => assert_eq!(message, "school missing not found"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(jobs.get("nope").is_none());
    }

    #[tokio::test]
    async fn only_recent_finished_jobs_are_kept() {
        let jobs = InMemJobs::with_retention(
            Gate {
                open: Arc::new(Notify::new()),
            },
            2,
        );
        let mut ids = Vec::new();
        for _ in 0..3 {
            let id = jobs.enqueue(GenerateRequest::for_school("quick-1")).id().clone();
            assert!(matches!(wait_for(&jobs, &id).await, JobStatus::Done { .. }));
            ids.push(id);
        }
        let other = jobs.enqueue(GenerateRequest::for_school("quick-2")).id().clone();
        wait_for(&jobs, &other).await;

        assert!(jobs.get(&ids[0].0).is_none());
        assert!(jobs.get(&ids[1].0).is_some());
        assert!(jobs.get(&ids[2].0).is_some());
        assert!(jobs.get(&other.0).is_some());
    }
}
