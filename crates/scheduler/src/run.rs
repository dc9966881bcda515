use async_trait::async_trait;
use chrono::Utc;
use sched_core::availability::AvailabilityIndex;
use sched_core::busy::BusyMatrix;
use sched_core::constraints::audit;
use sched_core::grid::GridShape;
use sched_core::plan::resolve_curriculum;
use sched_core::serialize::{serialize_timetable, TimetableMeta};
use sched_core::store::Store;
use sched_core::working_set::load_working_set;
use sched_core::{Generator, ScheduleError};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};
use types::{GenerateRequest, RunSummary, Stream, StreamId, StreamReport, StreamState};

use crate::{SchedulerConfig, SlotScheduler};

/// A full generation run over a store: load, schedule each stream, persist
/// what completed.
pub struct Generation<S: Store> {
    store: Arc<S>,
    config: SchedulerConfig,
}

impl<S: Store> Generation<S> {
    pub fn new(store: Arc<S>, config: SchedulerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// A stream that failed to regenerate loses its latest row: that row was
    /// not blocking teachers during this run.
    async fn retire(&self, stream: &StreamId) -> Result<(), ScheduleError> {
        if let Some(old) = self.store.retire_latest(stream).await? {
            warn!(stream = %stream, timetable = %old, "previous timetable retired");
        }
        Ok(())
    }
}

fn report(stream: &Stream, state: StreamState) -> StreamReport {
    StreamReport {
        stream_id: stream.id.clone(),
        name: stream.display_name(),
        state,
        timetable_id: None,
        reason: None,
        message: None,
        budget_exhausted: false,
        retries: 0,
    }
}

#[async_trait]
impl<S: Store> Generator for Generation<S> {
    async fn generate(&self, req: GenerateRequest) -> Result<RunSummary, ScheduleError> {
        let started_at = Utc::now();
        let ws = load_working_set(&*self.store, &req.school_id).await?;

        let targets: HashSet<_> = match &req.streams {
            None => ws.streams.iter().map(|s| s.id.clone()).collect(),
            Some(ids) => {
                for id in ids {
                    if !ws.streams.iter().any(|s| &s.id == id) {
                        return Err(ScheduleError::not_found("stream", id));
                    }
                }
                ids.iter().cloned().collect()
            }
        };
        info!(
            school = %ws.school.id,
            streams = targets.len(),
            teachers = ws.teachers.len(),
            "generation started"
        );

        let shape = GridShape::of(&ws.template);
        let index = AvailabilityIndex::build(shape, &ws.teachers);
        let mut busy = BusyMatrix::for_index(&index);

        for stream in ws.streams.iter().filter(|s| !targets.contains(&s.id)) {
            let Some(prior) = self.store.latest_timetable(&stream.id).await? else {
                continue;
            };
            if GridShape::of(&prior.template) != shape {
                warn!(stream = %stream.id, timetable = %prior.id, "prior timetable has a different grid, not blocking its teachers");
                continue;
            }
            busy.seed(&index, &prior);
        }

        let names = ws.subject_names();
        let scheduler = SlotScheduler::new(&index, self.config);
        let mut reports = Vec::with_capacity(targets.len());

        for (offset, stream) in ws.streams.iter().enumerate() {
            if !targets.contains(&stream.id) {
                continue;
            }
            let curriculum = match resolve_curriculum(stream, &ws.subjects, &ws.template) {
                Ok(c) => c,
                Err(reason) => {
                    warn!(stream = %stream.id, %reason, "stream skipped");
                    let mut r = report(stream, StreamState::Infeasible);
                    r.message = Some(reason.to_string());
                    r.reason = Some(reason);
                    reports.push(r);
                    self.retire(&stream.id).await?;
                    continue;
                }
            };

            let outcome = scheduler.schedule(stream, &curriculum, offset, &mut busy);
            let mut r = report(stream, outcome.state);
            r.retries = outcome.retries;
            r.budget_exhausted = outcome.budget_exhausted;

            if outcome.state == StreamState::Complete {
                let meta = TimetableMeta {
                    school_id: ws.school.id.clone(),
                    generated_at: started_at,
                    generated_by: req.requested_by.clone(),
                    template_type: ws.school.timetable_template.clone(),
                };
                let tt = serialize_timetable(stream, &outcome.grid, &ws.template, &names, meta)
                    .inspect_err(|e| error!(stream = %stream.id, error = %e, "refusing to persist timetable"))?;
                r.timetable_id = Some(tt.id.clone());
                self.store.insert_timetable(tt).await?;
                info!(stream = %stream.id, retries = outcome.retries, "timetable persisted");
            } else if let Some(reason) = outcome.reason {
                warn!(
                    stream = %stream.id,
                    %reason,
                    budget_exhausted = outcome.budget_exhausted,
                    "stream infeasible"
                );
                r.message = Some(if outcome.budget_exhausted {
                    format!("{reason} (retry budget exhausted)")
                } else {
                    reason.to_string()
                });
                r.reason = Some(reason);
            }
            if outcome.state != StreamState::Complete {
                self.retire(&stream.id).await?;
            }
            reports.push(r);
        }

        let loads: Vec<_> = index
            .teachers()
            .iter()
            .enumerate()
            .map(|(t, entry)| (entry.id.clone(), busy.load(t)))
            .collect();
        self.store.record_workloads(&ws.school.id, &loads).await?;

        let mut latest = self.store.timetables(&ws.school.id, false).await?;
        latest.retain(|tt| GridShape::of(&tt.template) == shape);
        for problem in audit(&index, &latest) {
            error!(school = %ws.school.id, %problem, "timetable audit failed");
        }

        // A request naming a single stream fails as a whole with it.
        if let ([_], [only]) = (req.streams.as_deref().unwrap_or_default(), reports.as_slice()) {
            if let (StreamState::Infeasible, Some(reason)) = (only.state, &only.reason) {
                return Err(ScheduleError::Infeasible {
                    stream: only.name.clone(),
                    reason: reason.clone(),
                });
            }
        }

        let summary = RunSummary {
            school_id: ws.school.id.clone(),
            started_at,
            finished_at: Utc::now(),
            streams: reports,
        };
        info!(
            school = %summary.school_id,
            completed = summary.completed(),
            infeasible = summary.infeasible(),
            "generation finished"
        );
        Ok(summary)
    }
}
