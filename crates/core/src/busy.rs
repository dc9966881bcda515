//! Teacher occupancy shared by every stream of one generation run.

use types::Timetable;

use crate::availability::AvailabilityIndex;
use crate::grid::{GridShape, SlotSet};

/// Which slots each teacher already teaches in this run, and how many lessons
/// that adds up to. Single writer: the run threads it through the streams.
#[derive(Clone, Debug)]
pub struct BusyMatrix {
    shape: GridShape,
    rows: Vec<SlotSet>,
    loads: Vec<u32>,
}

impl BusyMatrix {
    pub fn new(shape: GridShape, teachers: usize) -> Self {
        Self {
            shape,
            rows: vec![SlotSet::empty(shape.len()); teachers],
            loads: vec![0; teachers],
        }
    }

    pub fn for_index(index: &AvailabilityIndex) -> Self {
        Self::new(index.shape(), index.len())
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    #[inline]
    pub fn is_busy(&self, teacher: usize, idx: usize) -> bool {
        self.rows[teacher].contains(idx)
    }

    #[inline]
    pub fn load(&self, teacher: usize) -> u32 {
        self.loads[teacher]
    }

    pub fn loads(&self) -> &[u32] {
        &self.loads
    }

    pub fn occupy(&mut self, teacher: usize, idx: usize) {
        if !self.rows[teacher].contains(idx) {
            self.rows[teacher].insert(idx);
            self.loads[teacher] += 1;
        }
    }

    pub fn release(&mut self, teacher: usize, idx: usize) {
        if self.rows[teacher].contains(idx) {
            self.rows[teacher].remove(idx);
            self.loads[teacher] -= 1;
        }
    }

    pub fn busy_slots(&self, teacher: usize) -> &SlotSet {
        &self.rows[teacher]
    }

    /// Marks the teachers of an existing timetable busy. Returns the number of
    /// cells applied; cells outside the grid or naming unknown teachers are
    /// skipped.
    pub fn seed(&mut self, index: &AvailabilityIndex, timetable: &Timetable) -> usize {
        let mut applied = 0;
        for cell in &timetable.cells {
            let (Some(t), Some(idx)) = (
                index.position(&cell.teacher_id),
                self.shape.index(cell.slot()),
            ) else {
                continue;
            };
            self.occupy(t, idx);
            applied += 1;
        }
        applied
    }
}
