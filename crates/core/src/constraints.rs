//! Hard checks applied before each commitment, soft rankings used to order
//! candidates, and the post-run audit.

use std::collections::{HashMap, HashSet};
use std::fmt;
use types::{SubjectId, TeacherId, Timetable};

use crate::availability::AvailabilityIndex;
use crate::busy::BusyMatrix;
use crate::grid::{GridShape, StreamGrid};
use crate::plan::Curriculum;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HardViolation {
    NotEligible,
    Unavailable,
    DoubleBooked,
    WorkloadCap { max: u32 },
    CellTaken,
}

impl fmt::Display for HardViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardViolation::NotEligible => f.write_str("teacher is not eligible for the subject"),
            HardViolation::Unavailable => f.write_str("teacher is not available at this slot"),
            HardViolation::DoubleBooked => f.write_str("teacher already teaches at this slot"),
            HardViolation::WorkloadCap { max } => {
                write!(f, "teacher already has {max} lessons this week")
            }
            HardViolation::CellTaken => f.write_str("cell is already filled"),
        }
    }
}

pub struct ConstraintEngine<'a> {
    index: &'a AvailabilityIndex,
}

impl<'a> ConstraintEngine<'a> {
    pub fn new(index: &'a AvailabilityIndex) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &'a AvailabilityIndex {
        self.index
    }

    pub fn check(
        &self,
        busy: &BusyMatrix,
        grid: &StreamGrid,
        idx: usize,
        subject: &SubjectId,
        teacher: usize,
    ) -> Result<(), HardViolation> {
        let entry = self.index.teacher(teacher);
        if !entry.is_eligible(subject) {
            return Err(HardViolation::NotEligible);
        }
        if !entry.is_free(idx) {
            return Err(HardViolation::Unavailable);
        }
        if busy.is_busy(teacher, idx) {
            return Err(HardViolation::DoubleBooked);
        }
        if busy.load(teacher) + 1 > entry.max_lessons {
            return Err(HardViolation::WorkloadCap {
                max: entry.max_lessons,
            });
        }
        if grid.is_filled(idx) {
            return Err(HardViolation::CellTaken);
        }
        Ok(())
    }

    /// Eligible teachers, lowest running load first. The sort is stable so
    /// ties keep the index order.
    pub fn rank_teachers(&self, busy: &BusyMatrix, subject: &SubjectId) -> Vec<usize> {
        let mut ranked = self.index.candidate_teachers(subject).to_vec();
        ranked.sort_by_key(|&t| busy.load(t));
        ranked
    }

    /// Upper bound on how many more lessons of `subject` the school's
    /// teachers could still take this week.
    pub fn remaining_capacity(&self, busy: &BusyMatrix, subject: &SubjectId) -> u32 {
        let shape = self.index.shape();
        self.index
            .candidate_teachers(subject)
            .iter()
            .map(|&t| {
                let entry = self.index.teacher(t);
                let headroom = entry.max_lessons.saturating_sub(busy.load(t));
                let open = (0..shape.len())
                    .filter(|&i| entry.is_free(i) && !busy.is_busy(t, i))
                    .count() as u32;
                headroom.min(open)
            })
            .sum()
    }
}

/// Curriculum positions in round-robin order starting at `start`, limited to
/// subjects with lessons left. `avoid` (the subject of the previous cell on
/// the same day) is moved to the back.
pub fn rank_subjects(
    curriculum: &Curriculum,
    remaining: &[u32],
    start: usize,
    avoid: Option<usize>,
) -> Vec<usize> {
    let n = curriculum.len();
    let mut order: Vec<usize> = (0..n)
        .map(|k| (start + k) % n)
        .filter(|&s| remaining[s] > 0)
        .collect();
    if let Some(a) = avoid {
        if order.len() > 1 {
            if let Some(pos) = order.iter().position(|&s| s == a) {
                let s = order.remove(pos);
                order.push(s);
            }
        }
    }
    order
}

/// Re-checks the hard constraints over finished timetables. Returns one
/// message per violation; empty means the week is sound.
pub fn audit(index: &AvailabilityIndex, timetables: &[Timetable]) -> Vec<String> {
    let mut problems = Vec::new();
    let mut taken: HashMap<(&TeacherId, u8, u8), &str> = HashMap::new();
    let mut load: HashMap<&TeacherId, u32> = HashMap::new();

    for tt in timetables {
        let stream = tt.stream_id.0.as_str();
        let shape = GridShape::of(&tt.template);
        let mut cells = HashSet::new();
        for c in &tt.cells {
            if !cells.insert((c.day, c.period)) {
                problems.push(format!("stream {stream}: slot {} filled twice", c.slot()));
            }
            if let Some((_, other)) = taken.get_key_value(&(&c.teacher_id, c.day, c.period)) {
                problems.push(format!(
                    "teacher {} double-booked at {} ({} and {stream})",
                    c.teacher_id,
                    c.slot(),
                    other
                ));
            } else {
                taken.insert((&c.teacher_id, c.day, c.period), stream);
            }
            *load.entry(&c.teacher_id).or_default() += 1;

            match index.position(&c.teacher_id) {
                None => problems.push(format!("stream {stream}: unknown teacher {}", c.teacher_id)),
                Some(t) => {
                    let entry = index.teacher(t);
                    if !entry.is_eligible(&c.subject_id) {
                        problems.push(format!(
                            "teacher {} is not eligible for {} ({stream} at {})",
                            c.teacher_id,
                            c.subject_id,
                            c.slot()
                        ));
                    }
                    if let Some(i) = index.shape().index(c.slot()) {
                        if !entry.is_free(i) {
                            problems.push(format!(
                                "teacher {} is unavailable at {} ({stream})",
                                c.teacher_id,
                                c.slot()
                            ));
                        }
                    }
                }
            }
        }
        if cells.len() != shape.len() {
            problems.push(format!(
                "stream {stream}: {} of {} cells filled",
                cells.len(),
                shape.len()
            ));
        }
    }

    let mut over: Vec<(&TeacherId, u32)> = load.into_iter().collect();
    over.sort();
    for (teacher, n) in over {
        if let Some(t) = index.position(teacher) {
            let max = index.teacher(t).max_lessons;
            if n > max {
                problems.push(format!("teacher {teacher} has {n} lessons, cap is {max}"));
            }
        }
    }
    problems
}
