use std::collections::HashMap;
use types::{School, SchoolDataset, SchoolId, Stream, Subject, SubjectId, Teacher, Template};

use crate::error::ScheduleError;
use crate::store::Store;
use crate::template::validate_template;
use crate::validate::validate_dataset;

/// Everything one generation run reads, in a storage-independent order.
#[derive(Clone, Debug)]
pub struct WorkingSet {
    pub school: School,
    pub template: Template,
    pub subjects: Vec<Subject>,
    pub teachers: Vec<Teacher>,
    pub streams: Vec<Stream>,
}

impl WorkingSet {
    pub fn subject_names(&self) -> HashMap<SubjectId, String> {
        self.subjects
            .iter()
            .map(|s| (s.id.clone(), s.name.clone()))
            .collect()
    }
}

pub async fn load_working_set<S: Store + ?Sized>(
    store: &S,
    school_id: &SchoolId,
) -> Result<WorkingSet, ScheduleError> {
    let school = store
        .school(school_id)
        .await?
        .ok_or_else(|| ScheduleError::not_found("school", school_id))?;
    let incomplete = |missing: &'static str| ScheduleError::IncompleteSetup {
        school: school.name.clone(),
        missing,
    };

    let Some(template_id) = school.template_id.clone() else {
        return Err(incomplete("a timetable template"));
    };
    let template = store
        .template(&template_id)
        .await?
        .ok_or_else(|| ScheduleError::not_found("template", &template_id))?;
    validate_template(&template)?;

    let mut subjects = store.subjects(school_id).await?;
    let mut teachers = store.teachers(school_id).await?;
    let mut streams = store.streams(school_id).await?;
    if subjects.is_empty() {
        return Err(incomplete("subjects"));
    }
    if teachers.is_empty() {
        return Err(incomplete("teachers"));
    }
    if streams.is_empty() {
        return Err(incomplete("streams"));
    }

    subjects.sort_by(|a, b| a.id.cmp(&b.id));
    teachers.sort_by(|a, b| a.id.cmp(&b.id));
    streams.sort_by(|a, b| {
        (a.grade, &a.stream_name, &a.id).cmp(&(b.grade, &b.stream_name, &b.id))
    });

    let ds = SchoolDataset {
        school,
        template: None,
        subjects,
        teachers,
        streams,
    };
    validate_dataset(&ds, Some(&template))
        .map_err(|e| ScheduleError::InvalidInput(e.to_string()))?;

    Ok(WorkingSet {
        school: ds.school,
        template,
        subjects: ds.subjects,
        teachers: ds.teachers,
        streams: ds.streams,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use types::{StreamId, StructureConfig, TeacherId, TemplateId};

    fn dataset(streams: &[(u8, &str, &str)]) -> SchoolDataset {
        let school = SchoolId::from("s1");
        SchoolDataset {
            school: School {
                id: school.clone(),
                name: "Hilltop".into(),
                location: None,
                school_type: Default::default(),
                template_id: None,
                timetable_template: "classic".into(),
            },
            template: Some(Template {
                id: TemplateId::from("tpl"),
                name: "t".into(),
                school_type: Default::default(),
                periods_per_day: 6,
                period_duration: 40,
                days_per_week: 5,
                start_time: "08:00".into(),
                end_time: "13:00".into(),
                break_config: vec![],
                structure_config: StructureConfig::default(),
            }),
            subjects: vec![Subject {
                id: SubjectId::from("math"),
                school_id: school.clone(),
                name: "Maths".into(),
            }],
            teachers: vec![Teacher {
                id: TeacherId::from("t1"),
                school_id: school.clone(),
                name: "Ada".into(),
                email: "ada@hilltop.test".into(),
                max_lessons_per_week: 25,
                workload: 0,
                subjects: vec![SubjectId::from("math")],
                availability: None,
            }],
            streams: streams
                .iter()
                .map(|(grade, name, id)| Stream {
                    id: StreamId::from(*id),
                    school_id: school.clone(),
                    grade: *grade,
                    stream_name: name.to_string(),
                    class_teacher: None,
                    curriculum: vec![],
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn streams_come_back_in_grade_then_name_order() {
        let store = MemStore::new();
        store
            .import(dataset(&[(8, "East", "a"), (7, "West", "b"), (7, "East", "c")]))
            .unwrap();
        let ws = load_working_set(&store, &SchoolId::from("s1")).await.unwrap();
        let ids: Vec<_> = ws.streams.iter().map(|s| s.id.0.as_str()).collect();
        assert_eq!(ids, ["c", "b", "a"]);
    }

    #[tokio::test]
    async fn missing_school_is_not_found() {
        let store = MemStore::new();
        let err = load_working_set(&store, &SchoolId::from("nope")).await.unwrap_err();
        assert_eq!(err.to_string(), "school nope not found");
    }

    #[tokio::test]
    async fn school_without_streams_is_incomplete() {
        let store = MemStore::new();
        store.import(dataset(&[])).unwrap();
        let err = load_working_set(&store, &SchoolId::from("s1")).await.unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::IncompleteSetup {
                missing: "streams",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn school_without_template_is_incomplete() {
        let store = MemStore::new();
        let mut ds = dataset(&[(7, "East", "a")]);
        ds.template = None;
        store.import(ds).unwrap();
        let err = load_working_set(&store, &SchoolId::from("s1")).await.unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::IncompleteSetup {
                missing: "a timetable template",
                ..
            }
        ));
    }
}
