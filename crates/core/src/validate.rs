use std::collections::HashSet;
use thiserror::Error;
use types::{SchoolDataset, Template};

use crate::grid::GridShape;
use crate::template::template_errors;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("invalid dataset: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

impl DatasetError {
    pub fn errors(&self) -> &[String] {
        match self {
            DatasetError::Invalid(e) => e,
        }
    }
}

/// Structural checks on an imported school. `template` is the template the
/// school will generate against, if already known.
pub fn validate_dataset(ds: &SchoolDataset, template: Option<&Template>) -> Result<(), DatasetError> {
    let mut errors: Vec<String> = Vec::new();
    let school = &ds.school.id;

    fn chk_unique<I: ToString>(name: &str, ids: impl Iterator<Item = I>, errors: &mut Vec<String>) {
        let mut seen = HashSet::new();
        for id in ids {
            let s = id.to_string();
            if !seen.insert(s.clone()) {
                errors.push(format!("duplicate {name}: {s}"));
            }
        }
    }
    chk_unique("subject id", ds.subjects.iter().map(|x| &x.id), &mut errors);
    chk_unique("subject name", ds.subjects.iter().map(|x| &x.name), &mut errors);
    chk_unique("teacher id", ds.teachers.iter().map(|x| &x.id), &mut errors);
    chk_unique("stream id", ds.streams.iter().map(|x| &x.id), &mut errors);
    chk_unique(
        "stream",
        ds.streams
            .iter()
            .map(|x| format!("grade {} {}", x.grade, x.stream_name)),
        &mut errors,
    );

    let template = ds.template.as_ref().or(template);
    if let Some(t) = &ds.template {
        if ds.school.template_id.as_ref().is_some_and(|id| id != &t.id) {
            errors.push(format!(
                "school selects template {} but the dataset carries {}",
                ds.school.template_id.as_ref().map(|i| i.0.as_str()).unwrap_or(""),
                t.id
            ));
        }
    }
    if let Some(t) = template {
        errors.extend(template_errors(t));
    }

    let subjects: HashSet<_> = ds.subjects.iter().map(|s| &s.id).collect();
    let teachers: HashSet<_> = ds.teachers.iter().map(|t| &t.id).collect();

    for s in &ds.subjects {
        if &s.school_id != school {
            errors.push(format!("subject {} belongs to school {}", s.id, s.school_id));
        }
        if s.name.trim().is_empty() {
            errors.push(format!("subject {} has an empty name", s.id));
        }
    }

    for t in &ds.teachers {
        if &t.school_id != school {
            errors.push(format!("teacher {} belongs to school {}", t.id, t.school_id));
        }
        if t.max_lessons_per_week == 0 {
            errors.push(format!("teacher {} has max_lessons_per_week=0", t.id));
        }
        for s in &t.subjects {
            if !subjects.contains(s) {
                errors.push(format!("teacher {} references missing subject {}", t.id, s));
            }
        }
        if let (Some(mask), Some(tpl)) = (&t.availability, template) {
            let shape = GridShape::of(tpl);
            for (day, periods) in &mask.0 {
                if day.index() >= shape.days as usize {
                    errors.push(format!(
                        "teacher {} lists availability on {}, the week has {} days",
                        t.id,
                        day.short(),
                        shape.days
                    ));
                }
                for &p in periods {
                    if p == 0 || p > shape.periods {
                        errors.push(format!(
                            "teacher {} lists period {} on {}, the day has {} periods",
                            t.id,
                            p,
                            day.short(),
                            shape.periods
                        ));
                    }
                }
            }
        }
    }

    for st in &ds.streams {
        if &st.school_id != school {
            errors.push(format!("stream {} belongs to school {}", st.id, st.school_id));
        }
        if let Some(ct) = &st.class_teacher {
            if !teachers.contains(ct) {
                errors.push(format!(
                    "stream {} references missing class teacher {}",
                    st.id, ct
                ));
            }
        }
        for req in &st.curriculum {
            if !subjects.contains(&req.subject_id) {
                errors.push(format!(
                    "stream {} references missing subject {}",
                    st.id, req.subject_id
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(DatasetError::Invalid(errors))
    }
}
