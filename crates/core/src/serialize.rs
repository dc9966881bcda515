//! Grid -> persisted timetable, with the checks that guard every write.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use types::{
    CellAssignment, SchoolId, Stream, SubjectId, TeacherId, Template, Timetable, TimetableData,
    TimetableId,
};
use uuid::Uuid;

use crate::grid::{GridShape, StreamGrid};
use crate::ScheduleError;

#[derive(Clone, Debug)]
pub struct TimetableMeta {
    pub school_id: SchoolId,
    pub generated_at: DateTime<Utc>,
    pub generated_by: Option<String>,
    pub template_type: String,
}

/// `{ dayLabel: [subject, ...] }`, one entry per teachable period.
pub fn timetable_data(
    grid: &StreamGrid,
    labels: &[String],
    names: &HashMap<SubjectId, String>,
) -> Result<TimetableData, String> {
    let shape = grid.shape();
    if labels.len() != shape.days as usize {
        return Err(format!(
            "{} day labels for {} days",
            labels.len(),
            shape.days
        ));
    }
    let mut days = Vec::with_capacity(shape.days as usize);
    for (d, label) in labels.iter().enumerate() {
        let mut row = Vec::with_capacity(shape.periods as usize);
        for p in 0..shape.periods as usize {
            let idx = d * shape.periods as usize + p;
            let slot = shape.slot(idx);
            let placement = grid
                .get(idx)
                .ok_or_else(|| format!("empty cell at {slot}"))?;
            let name = names
                .get(&placement.subject)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| format!("subject {} at {slot} has no name", placement.subject))?;
            row.push(name.clone());
        }
        days.push((label.clone(), row));
    }
    Ok(TimetableData(days))
}

pub fn cells(grid: &StreamGrid) -> Result<Vec<CellAssignment>, String> {
    grid.cells()
        .map(|(slot, p)| {
            let p = p.ok_or_else(|| format!("empty cell at {slot}"))?;
            Ok(CellAssignment {
                day: slot.day,
                period: slot.period,
                subject_id: p.subject.clone(),
                teacher_id: p.teacher.clone(),
            })
        })
        .collect()
}

pub fn subject_tally(data: &TimetableData) -> BTreeMap<String, u32> {
    let mut out = BTreeMap::new();
    for (_, row) in &data.0 {
        for s in row {
            *out.entry(s.clone()).or_default() += 1;
        }
    }
    out
}

pub fn teacher_tally(cells: &[CellAssignment]) -> BTreeMap<TeacherId, u32> {
    let mut out = BTreeMap::new();
    for c in cells {
        *out.entry(c.teacher_id.clone()).or_default() += 1;
    }
    out
}

fn grid_tallies(
    grid: &StreamGrid,
    names: &HashMap<SubjectId, String>,
) -> (BTreeMap<String, u32>, BTreeMap<TeacherId, u32>) {
    let mut subjects = BTreeMap::new();
    let mut teachers = BTreeMap::new();
    for (_, p) in grid.cells() {
        if let Some(p) = p {
            let name = names.get(&p.subject).cloned().unwrap_or_default();
            *subjects.entry(name).or_default() += 1;
            *teachers.entry(p.teacher.clone()).or_default() += 1;
        }
    }
    (subjects, teachers)
}

/// Builds the row for a completed stream. Fails with `Validation` if the grid
/// has a gap, a day has the wrong number of entries, or the JSON written back
/// does not recount to the grid.
pub fn serialize_timetable(
    stream: &Stream,
    grid: &StreamGrid,
    template: &Template,
    names: &HashMap<SubjectId, String>,
    meta: TimetableMeta,
) -> Result<Timetable, ScheduleError> {
    let invalid = |message: String| ScheduleError::Validation {
        stream: stream.display_name(),
        message,
    };
    if grid.shape() != GridShape::of(template) {
        return Err(invalid("grid does not match the template".into()));
    }
    let data = timetable_data(grid, &template.day_labels(), names).map_err(invalid)?;
    for (day, row) in &data.0 {
        if row.len() != template.periods_per_day as usize {
            return Err(invalid(format!(
                "{day} has {} entries, expected {}",
                row.len(),
                template.periods_per_day
            )));
        }
    }
    let tt = Timetable {
        id: TimetableId(Uuid::new_v4().to_string()),
        school_id: meta.school_id,
        stream_id: stream.id.clone(),
        generated_at: meta.generated_at,
        generated_by: meta.generated_by,
        template_type: meta.template_type,
        template: template.clone(),
        cells: cells(grid).map_err(invalid)?,
        timetable_data: data,
        is_latest: true,
    };
    verify_round_trip(&tt, grid, names).map_err(invalid)?;
    Ok(tt)
}

/// Serializes `tt`, parses it back and compares subject and teacher counts
/// with the grid it came from.
pub fn verify_round_trip(
    tt: &Timetable,
    grid: &StreamGrid,
    names: &HashMap<SubjectId, String>,
) -> Result<(), String> {
    let json = serde_json::to_string(tt).map_err(|e| e.to_string())?;
    let back: Timetable = serde_json::from_str(&json).map_err(|e| e.to_string())?;
    let (subjects, teachers) = grid_tallies(grid, names);
    let got_subjects = subject_tally(&back.timetable_data);
    if got_subjects != subjects {
        return Err(format!(
            "subject counts changed in transit: {got_subjects:?} vs {subjects:?}"
        ));
    }
    let got_teachers = teacher_tally(&back.cells);
    if got_teachers != teachers {
        return Err(format!(
            "teacher counts changed in transit: {got_teachers:?} vs {teachers:?}"
        ));
    }
    Ok(())
}
