use types::{Slot, SubjectId, TeacherId, Template};

/// Days x teachable periods of one week. Breaks are not part of the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridShape {
    pub days: u8,
    pub periods: u8,
}

impl GridShape {
    pub fn new(days: u8, periods: u8) -> Self {
        Self { days, periods }
    }

    pub fn of(template: &Template) -> Self {
        Self::new(template.days_per_week, template.periods_per_day)
    }

    pub fn len(&self) -> usize {
        self.days as usize * self.periods as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Day-major, period-ascending.
    pub fn index(&self, slot: Slot) -> Option<usize> {
        if slot.day >= self.days || slot.period >= self.periods {
            return None;
        }
        Some(slot.day as usize * self.periods as usize + slot.period as usize)
    }

    pub fn slot(&self, idx: usize) -> Slot {
        let p = self.periods as usize;
        Slot::new((idx / p) as u8, (idx % p) as u8)
    }

    pub fn slots(&self) -> impl Iterator<Item = Slot> + '_ {
        (0..self.len()).map(move |i| self.slot(i))
    }
}

/// Fixed-size bitset over the slots of a grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotSet {
    words: Vec<u64>,
    len: usize,
}

impl SlotSet {
    pub fn empty(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    pub fn full(len: usize) -> Self {
        let mut s = Self::empty(len);
        for i in 0..len {
            s.insert(i);
        }
        s
    }

    #[inline]
    pub fn contains(&self, i: usize) -> bool {
        i < self.len && self.words[i / 64] & (1u64 << (i % 64)) != 0
    }

    #[inline]
    pub fn insert(&mut self, i: usize) {
        if i < self.len {
            self.words[i / 64] |= 1u64 << (i % 64);
        }
    }

    #[inline]
    pub fn remove(&mut self, i: usize) {
        if i < self.len {
            self.words[i / 64] &= !(1u64 << (i % 64));
        }
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn capacity(&self) -> usize {
        self.len
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |&i| self.contains(i))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub subject: SubjectId,
    pub teacher: TeacherId,
}

/// One stream's week under construction.
#[derive(Clone, Debug)]
pub struct StreamGrid {
    shape: GridShape,
    cells: Vec<Option<Placement>>,
}

impl StreamGrid {
    pub fn new(shape: GridShape) -> Self {
        Self {
            shape,
            cells: vec![None; shape.len()],
        }
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn get(&self, idx: usize) -> Option<&Placement> {
        self.cells.get(idx).and_then(|c| c.as_ref())
    }

    pub fn is_filled(&self, idx: usize) -> bool {
        self.get(idx).is_some()
    }

    pub fn fill(&mut self, idx: usize, placement: Placement) {
        if let Some(c) = self.cells.get_mut(idx) {
            *c = Some(placement);
        }
    }

    pub fn clear(&mut self, idx: usize) -> Option<Placement> {
        self.cells.get_mut(idx).and_then(|c| c.take())
    }

    pub fn filled(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.filled() == self.cells.len()
    }

    pub fn cells(&self) -> impl Iterator<Item = (Slot, Option<&Placement>)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, c)| (self.shape.slot(i), c.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_and_slot_are_inverse() {
        let shape = GridShape::new(5, 6);
        for i in 0..shape.len() {
            assert_eq!(shape.index(shape.slot(i)), Some(i));
        }
        assert_eq!(shape.index(Slot::new(5, 0)), None);
        assert_eq!(shape.index(Slot::new(0, 6)), None);
        assert_eq!(shape.slot(7), Slot::new(1, 1));
    }

    #[test]
    fn slot_set_spans_word_boundaries() {
        let mut s = SlotSet::empty(112);
        s.insert(0);
        s.insert(63);
        s.insert(64);
        s.insert(111);
        s.insert(200);
        assert_eq!(s.count(), 4);
        assert!(s.contains(64));
        s.remove(64);
        assert!(!s.contains(64));
        assert_eq!(SlotSet::full(70).count(), 70);
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![0, 63, 111]);
    }
}
