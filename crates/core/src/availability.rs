//! Read-only per-run snapshot of who can teach what, and when.

use std::collections::{HashMap, HashSet};
use types::{Slot, SubjectId, Teacher, TeacherId};

use crate::grid::{GridShape, SlotSet};

#[derive(Clone, Debug)]
pub struct TeacherEntry {
    pub id: TeacherId,
    pub name: String,
    pub max_lessons: u32,
    /// Workload recorded by the previous run; only used for ordering.
    pub recorded_workload: u32,
    eligible: HashSet<SubjectId>,
    free: SlotSet,
}

impl TeacherEntry {
    pub fn is_eligible(&self, subject: &SubjectId) -> bool {
        self.eligible.contains(subject)
    }

    pub fn is_free(&self, idx: usize) -> bool {
        self.free.contains(idx)
    }

    pub fn free_slots(&self) -> &SlotSet {
        &self.free
    }
}

#[derive(Clone, Debug)]
pub struct AvailabilityIndex {
    shape: GridShape,
    teachers: Vec<TeacherEntry>,
    by_id: HashMap<TeacherId, usize>,
    by_subject: HashMap<SubjectId, Vec<usize>>,
}

impl AvailabilityIndex {
    /// Teachers are indexed in id order so positions do not depend on how the
    /// store returned them.
    pub fn build(shape: GridShape, teachers: &[Teacher]) -> Self {
        let mut sorted: Vec<&Teacher> = teachers.iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        let mut entries = Vec::with_capacity(sorted.len());
        let mut by_id = HashMap::with_capacity(sorted.len());
        let mut by_subject: HashMap<SubjectId, Vec<usize>> = HashMap::new();

        for (pos, t) in sorted.into_iter().enumerate() {
            let free = match &t.availability {
                None => SlotSet::full(shape.len()),
                Some(mask) => {
                    let mut s = SlotSet::empty(shape.len());
                    for (day, periods) in &mask.0 {
                        for &p in periods {
                            if p == 0 {
                                continue;
                            }
                            if let Some(idx) = shape.index(Slot::new(day.index() as u8, p - 1)) {
                                s.insert(idx);
                            }
                        }
                    }
                    s
                }
            };
            let eligible: HashSet<SubjectId> = t.subjects.iter().cloned().collect();
            for s in &eligible {
                by_subject.entry(s.clone()).or_default().push(pos);
            }
            by_id.insert(t.id.clone(), pos);
            entries.push(TeacherEntry {
                id: t.id.clone(),
                name: t.name.clone(),
                max_lessons: t.max_lessons_per_week,
                recorded_workload: t.workload,
                eligible,
                free,
            });
        }

        for list in by_subject.values_mut() {
            list.sort_by(|&a, &b| {
                entries[a]
                    .recorded_workload
                    .cmp(&entries[b].recorded_workload)
                    .then_with(|| entries[a].id.cmp(&entries[b].id))
            });
        }

        Self {
            shape,
            teachers: entries,
            by_id,
            by_subject,
        }
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.teachers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teachers.is_empty()
    }

    pub fn teacher(&self, pos: usize) -> &TeacherEntry {
        &self.teachers[pos]
    }

    pub fn teachers(&self) -> &[TeacherEntry] {
        &self.teachers
    }

    pub fn position(&self, id: &TeacherId) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Eligible teachers for `subject`, least loaded first, then by id.
    pub fn candidate_teachers(&self, subject: &SubjectId) -> &[usize] {
        self.by_subject
            .get(subject)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}
