//! Which subjects a stream takes and how many lessons each gets per week.

use std::collections::{HashMap, HashSet};
use tracing::warn;
use types::{InfeasibleReason, Stream, Subject, SubjectId, Template};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurriculumEntry {
    pub subject: SubjectId,
    pub name: String,
    pub quota: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Curriculum {
    pub entries: Vec<CurriculumEntry>,
}

impl Curriculum {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> u32 {
        self.entries.iter().map(|e| e.quota).sum()
    }

    pub fn position(&self, subject: &SubjectId) -> Option<usize> {
        self.entries.iter().position(|e| &e.subject == subject)
    }
}

fn invalid(message: String) -> InfeasibleReason {
    InfeasibleReason::InvalidCurriculum { message }
}

/// Resolves the stream's subject list (explicit curriculum, else the
/// template's subject names, else every school subject by name) and splits the
/// week's periods between them.
pub fn resolve_curriculum(
    stream: &Stream,
    subjects: &[Subject],
    template: &Template,
) -> Result<Curriculum, InfeasibleReason> {
    let by_id: HashMap<&SubjectId, &Subject> = subjects.iter().map(|s| (&s.id, s)).collect();
    let mut picked: Vec<(&Subject, Option<u32>)> = Vec::new();

    if !stream.curriculum.is_empty() {
        let mut seen = HashSet::new();
        for req in &stream.curriculum {
            let Some(s) = by_id.get(&req.subject_id) else {
                return Err(invalid(format!("unknown subject {}", req.subject_id)));
            };
            if !seen.insert(&req.subject_id) {
                return Err(invalid(format!("{} is listed twice", s.name)));
            }
            if req.lessons_per_week == Some(0) {
                return Err(invalid(format!("{} has zero lessons per week", s.name)));
            }
            picked.push((s, req.lessons_per_week));
        }
    } else {
        let mut seen = HashSet::new();
        for name in &template.structure_config.subjects {
            match subjects.iter().find(|s| &s.name == name) {
                Some(s) if seen.insert(&s.id) => picked.push((s, None)),
                Some(_) => {}
                None => warn!(template = %template.id, subject = %name, "template subject not offered by school"),
            }
        }
        if picked.is_empty() {
            let mut all: Vec<&Subject> = subjects.iter().collect();
            all.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
            picked = all.into_iter().map(|s| (s, None)).collect();
        }
    }

    if picked.is_empty() {
        return Err(invalid("no subjects to schedule".into()));
    }

    let cells = template.slots_per_week() as u32;
    let explicit: u32 = picked.iter().filter_map(|(_, q)| *q).sum();
    let open = picked.iter().filter(|(_, q)| q.is_none()).count() as u32;

    if explicit > cells || (open == 0 && explicit != cells) {
        return Err(invalid(format!(
            "lessons per week add up to {explicit} but the week has {cells} periods"
        )));
    }
    let rest = cells - explicit;
    if open > 0 && rest < open {
        return Err(invalid(format!(
            "{rest} periods left for {open} subjects without a fixed lesson count"
        )));
    }

    let (base, mut extra) = if open > 0 {
        (rest / open, rest % open)
    } else {
        (0, 0)
    };
    let entries = picked
        .into_iter()
        .map(|(s, q)| {
            let quota = q.unwrap_or_else(|| {
                if extra > 0 {
                    extra -= 1;
                    base + 1
                } else {
                    base
                }
            });
            CurriculumEntry {
                subject: s.id.clone(),
                name: s.name.clone(),
                quota,
            }
        })
        .collect();

    Ok(Curriculum { entries })
}
