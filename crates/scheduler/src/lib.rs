//! Depth-first slot filling with a bounded number of backtracks.

mod run;

pub use run::Generation;

use sched_core::availability::AvailabilityIndex;
use sched_core::busy::BusyMatrix;
use sched_core::constraints::{rank_subjects, ConstraintEngine};
use sched_core::grid::{Placement, StreamGrid};
use sched_core::plan::Curriculum;
use serde::{Deserialize, Serialize};
use tracing::debug;
use types::{InfeasibleReason, Stream, StreamState};

pub const DEFAULT_RETRY_FACTOR: u32 = 32;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Backtracks allowed per cell of the grid.
    pub retry_factor: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            retry_factor: DEFAULT_RETRY_FACTOR,
        }
    }
}

#[derive(Clone, Debug)]
pub struct StreamOutcome {
    pub state: StreamState,
    pub grid: StreamGrid,
    pub reason: Option<InfeasibleReason>,
    pub budget_exhausted: bool,
    pub retries: u32,
}

/// One cell of the search: the candidates it was entered with, how far
/// through them we are, and what is committed there now.
struct Frame {
    idx: usize,
    lead: Option<usize>,
    candidates: Vec<(usize, usize)>,
    next: usize,
    committed: Option<(usize, usize)>,
}

pub struct SlotScheduler<'a> {
    engine: ConstraintEngine<'a>,
    config: SchedulerConfig,
}

fn transition(stream: &Stream, state: &mut StreamState, next: StreamState) {
    debug_assert!(state.can_become(next), "{state:?} -> {next:?}");
    debug!(stream = %stream.id, from = ?*state, to = ?next, "stream state");
    *state = next;
}

impl<'a> SlotScheduler<'a> {
    pub fn new(index: &'a AvailabilityIndex, config: SchedulerConfig) -> Self {
        Self {
            engine: ConstraintEngine::new(index),
            config,
        }
    }

    /// Fills one stream's week against the shared `busy` matrix. On success
    /// the stream's lessons stay committed in `busy`; on failure none do.
    /// `offset` picks the subject the first cell tries first.
    pub fn schedule(
        &self,
        stream: &Stream,
        curriculum: &Curriculum,
        offset: usize,
        busy: &mut BusyMatrix,
    ) -> StreamOutcome {
        let shape = self.engine.index().shape();
        let mut state = StreamState::Unscheduled;
        let mut grid = StreamGrid::new(shape);

        if let Some(reason) = self.precheck(curriculum, busy) {
            transition(stream, &mut state, StreamState::Infeasible);
            return StreamOutcome {
                state,
                grid,
                reason: Some(reason),
                budget_exhausted: false,
                retries: 0,
            };
        }
        transition(stream, &mut state, StreamState::InProgress);

        let cells = shape.len();
        let budget = u64::from(self.config.retry_factor) * cells as u64;
        let mut remaining: Vec<u32> = curriculum.entries.iter().map(|e| e.quota).collect();
        let mut stack: Vec<Frame> = Vec::with_capacity(cells);
        let mut retries: u64 = 0;
        let mut deepest: Option<(usize, Option<usize>)> = None;
        let mut exhausted = false;

        'cells: while stack.len() < cells {
            let frame = self.enter(curriculum, &remaining, &stack, offset, busy, &grid);
            stack.push(frame);

            loop {
                let Some(top) = stack.last_mut() else {
                    break 'cells;
                };
                if let Some((s, t)) = top.committed.take() {
                    grid.clear(top.idx);
                    busy.release(t, top.idx);
                    remaining[s] += 1;
                }
                if let Some(&(s, t)) = top.candidates.get(top.next) {
                    top.next += 1;
                    top.committed = Some((s, t));
                    grid.fill(
                        top.idx,
                        Placement {
                            subject: curriculum.entries[s].subject.clone(),
                            teacher: self.engine.index().teacher(t).id.clone(),
                        },
                    );
                    busy.occupy(t, top.idx);
                    remaining[s] -= 1;
                    continue 'cells;
                }

                if deepest.map_or(true, |(idx, _)| top.idx > idx) {
                    deepest = Some((top.idx, top.lead));
                }
                stack.pop();
                if stack.is_empty() {
                    break 'cells;
                }
                if retries >= budget {
                    exhausted = true;
                    break 'cells;
                }
                retries += 1;
                debug!(stream = %stream.id, cell = %shape.slot(stack.len()), retries, "backtrack");
            }
        }

        let retries = u32::try_from(retries).unwrap_or(u32::MAX);
        if stack.len() == cells && grid.is_complete() {
            transition(stream, &mut state, StreamState::Complete);
            return StreamOutcome {
                state,
                grid,
                reason: None,
                budget_exhausted: false,
                retries,
            };
        }

        for frame in stack.drain(..).rev() {
            if let Some((_, t)) = frame.committed {
                grid.clear(frame.idx);
                busy.release(t, frame.idx);
            }
        }
        let (idx, lead) = deepest.unwrap_or((0, None));
        let subject = lead
            .or(if curriculum.is_empty() { None } else { Some(0) })
            .map(|s| curriculum.entries[s].name.clone())
            .unwrap_or_default();
        transition(stream, &mut state, StreamState::Infeasible);
        StreamOutcome {
            state,
            grid,
            reason: Some(InfeasibleReason::NoCandidate {
                subject,
                slot: shape.slot(idx),
            }),
            budget_exhausted: exhausted,
            retries,
        }
    }

    fn precheck(&self, curriculum: &Curriculum, busy: &BusyMatrix) -> Option<InfeasibleReason> {
        for entry in &curriculum.entries {
            if self.engine.index().candidate_teachers(&entry.subject).is_empty() {
                return Some(InfeasibleReason::NoEligibleTeacher {
                    subject: entry.name.clone(),
                });
            }
            let available = self.engine.remaining_capacity(busy, &entry.subject);
            if available < entry.quota {
                return Some(InfeasibleReason::InsufficientCapacity {
                    subject: entry.name.clone(),
                    needed: entry.quota,
                    available,
                });
            }
        }
        None
    }

    /// Builds the frame for the next empty cell: subjects in rotation order,
    /// and for each one the teachers that pass every hard check right now.
    fn enter(
        &self,
        curriculum: &Curriculum,
        remaining: &[u32],
        stack: &[Frame],
        offset: usize,
        busy: &BusyMatrix,
        grid: &StreamGrid,
    ) -> Frame {
        let idx = stack.len();
        let periods = self.engine.index().shape().periods as usize;
        let previous = stack.last().and_then(|f| f.committed).map(|(s, _)| s);
        let n = curriculum.len().max(1);
        let start = match previous {
            Some(s) => (s + 1) % n,
            None => offset % n,
        };
        let avoid = if idx % periods == 0 { None } else { previous };

        let subjects = rank_subjects(curriculum, remaining, start, avoid);
        let mut candidates = Vec::new();
        for &s in &subjects {
            let subject = &curriculum.entries[s].subject;
            for t in self.engine.rank_teachers(busy, subject) {
                if self.engine.check(busy, grid, idx, subject, t).is_ok() {
                    candidates.push((s, t));
                }
            }
        }
        Frame {
            idx,
            lead: subjects.first().copied(),
            candidates,
            next: 0,
            committed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_core::grid::GridShape;
    use sched_core::plan::CurriculumEntry;
    use types::{SchoolId, StreamId, SubjectId, Teacher, TeacherId};

    fn teacher(id: &str, subjects: &[&str], max: u32) -> Teacher {
        Teacher {
            id: TeacherId::from(id),
            school_id: SchoolId::from("s"),
            name: id.into(),
            email: format!("{id}@school.test"),
            max_lessons_per_week: max,
            workload: 0,
            subjects: subjects.iter().map(|s| SubjectId::from(*s)).collect(),
            availability: None,
        }
    }

    fn stream() -> Stream {
        Stream {
            id: StreamId::from("st"),
            school_id: SchoolId::from("s"),
            grade: 1,
            stream_name: "A".into(),
            class_teacher: None,
            curriculum: vec![],
        }
    }

    fn curriculum(entries: &[(&str, u32)]) -> Curriculum {
        Curriculum {
            entries: entries
                .iter()
                .map(|(s, q)| CurriculumEntry {
                    subject: SubjectId::from(*s),
                    name: s.to_string(),
                    quota: *q,
                })
                .collect(),
        }
    }

    #[test]
    fn fills_every_cell_in_rotation() {
        let index = AvailabilityIndex::build(
            GridShape::new(5, 2),
            &[teacher("a", &["x"], 25), teacher("b", &["y"], 25)],
        );
        let mut busy = BusyMatrix::for_index(&index);
        let out = SlotScheduler::new(&index, SchedulerConfig::default()).schedule(
            &stream(),
            &curriculum(&[("x", 5), ("y", 5)]),
            0,
            &mut busy,
        );
        assert_eq!(out.state, StreamState::Complete);
        assert_eq!(out.retries, 0);
        let subjects: Vec<_> = out
            .grid
            .cells()
            .map(|(_, p)| p.map(|p| p.subject.0.clone()).unwrap_or_default())
            .collect();
        assert_eq!(subjects[..4], ["x", "y", "x", "y"]);
        assert_eq!(busy.load(0), 5);
        assert_eq!(busy.load(1), 5);
    }

    #[test]
    fn offset_shifts_the_first_subject() {
        let index = AvailabilityIndex::build(
            GridShape::new(5, 2),
            &[teacher("a", &["x"], 25), teacher("b", &["y"], 25)],
        );
        let mut busy = BusyMatrix::for_index(&index);
        let out = SlotScheduler::new(&index, SchedulerConfig::default()).schedule(
            &stream(),
            &curriculum(&[("x", 5), ("y", 5)]),
            1,
            &mut busy,
        );
        assert_eq!(out.grid.get(0).unwrap().subject, SubjectId::from("y"));
    }

    #[test]
    fn subject_nobody_teaches_fails_before_search() {
        let index = AvailabilityIndex::build(GridShape::new(5, 1), &[teacher("a", &["x"], 25)]);
        let mut busy = BusyMatrix::for_index(&index);
        let out = SlotScheduler::new(&index, SchedulerConfig::default()).schedule(
            &stream(),
            &curriculum(&[("x", 3), ("y", 2)]),
            0,
            &mut busy,
        );
        assert_eq!(out.state, StreamState::Infeasible);
        assert_eq!(
            out.reason,
            Some(InfeasibleReason::NoEligibleTeacher {
                subject: "y".into()
            })
        );
        assert_eq!(busy.load(0), 0);
    }

    #[test]
    fn short_capacity_fails_before_search() {
        let shape = GridShape::new(5, 1);
        let mut only_monday = teacher("b", &["y"], 25);
        let mut days = std::collections::BTreeMap::new();
        days.insert(types::DayOfWeek::Mon, vec![1]);
        only_monday.availability = Some(types::Availability(days));
        let index = AvailabilityIndex::build(shape, &[teacher("a", &["x"], 25), only_monday]);
        let mut busy = BusyMatrix::for_index(&index);
        let out = SlotScheduler::new(&index, SchedulerConfig::default()).schedule(
            &stream(),
            &curriculum(&[("x", 3), ("y", 2)]),
            0,
            &mut busy,
        );
        assert_eq!(out.state, StreamState::Infeasible);
        assert!(matches!(
            out.reason,
            Some(InfeasibleReason::InsufficientCapacity { needed: 2, available: 1, .. })
        ));
        assert_eq!(busy.loads(), [0, 0]);
        assert_eq!(out.grid.filled(), 0);
    }
}
