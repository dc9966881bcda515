//! Persistence seam for schools and their timetables, plus the in-memory
//! store the service runs on.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::info;
use types::{
    School, SchoolDataset, SchoolId, Stream, StreamId, Subject, SubjectId, Teacher, TeacherId,
    Template, TemplateId, Timetable, TimetableId,
};

use crate::error::{ScheduleError, StoreError};
use crate::template::validate_template;
use crate::validate::validate_dataset;

#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn school(&self, id: &SchoolId) -> Result<Option<School>, StoreError>;
    async fn template(&self, id: &TemplateId) -> Result<Option<Template>, StoreError>;
    async fn subjects(&self, school: &SchoolId) -> Result<Vec<Subject>, StoreError>;
    async fn teachers(&self, school: &SchoolId) -> Result<Vec<Teacher>, StoreError>;
    async fn streams(&self, school: &SchoolId) -> Result<Vec<Stream>, StoreError>;
    async fn latest_timetable(&self, stream: &StreamId) -> Result<Option<Timetable>, StoreError>;
    /// Appends `tt` as the stream's latest row; older rows stay as history.
    async fn insert_timetable(&self, tt: Timetable) -> Result<(), StoreError>;
    /// Clears `is_latest` on the stream's current row, leaving it as history.
    /// Returns the retired row's id.
    async fn retire_latest(&self, stream: &StreamId) -> Result<Option<TimetableId>, StoreError>;
    async fn timetables(
        &self,
        school: &SchoolId,
        history: bool,
    ) -> Result<Vec<Timetable>, StoreError>;
    async fn timetable(&self, id: &TimetableId) -> Result<Option<Timetable>, StoreError>;
    async fn record_workloads(
        &self,
        school: &SchoolId,
        loads: &[(TeacherId, u32)],
    ) -> Result<(), StoreError>;
}

#[derive(Default)]
struct Tables {
    schools: BTreeMap<SchoolId, School>,
    templates: BTreeMap<TemplateId, Template>,
    subjects: BTreeMap<SubjectId, Subject>,
    teachers: BTreeMap<TeacherId, Teacher>,
    streams: BTreeMap<StreamId, Stream>,
    timetables: Vec<Timetable>,
}

#[derive(Default)]
pub struct MemStore {
    inner: RwLock<Tables>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces everything the store knows about `ds.school`. Timetables of
    /// streams that survive the import are kept.
    ///
    /// Ids belonging to another school and a changed copy of an existing
    /// template are refused with `StoreError::Conflict`; templates change
    /// through `upsert_template` only.
    pub fn import(&self, ds: SchoolDataset) -> Result<(), ScheduleError> {
        let known = {
            let r = self.inner.read();
            ds.school
                .template_id
                .as_ref()
                .and_then(|id| r.templates.get(id).cloned())
        };
        validate_dataset(&ds, known.as_ref()).map_err(|e| ScheduleError::InvalidInput(e.to_string()))?;

        let SchoolDataset {
            mut school,
            template,
            subjects,
            teachers,
            streams,
        } = ds;
        let id = school.id.clone();

        let mut w = self.inner.write();
        let mut clashes = Vec::new();
        if let Some(t) = &template {
            if w.templates.get(&t.id).is_some_and(|known| known != t) {
                clashes.push(format!("template {} already exists with different settings", t.id));
            }
        }
        let foreign = |owner: &SchoolId| owner != &id;
        for s in &subjects {
            if let Some(other) = w.subjects.get(&s.id).filter(|x| foreign(&x.school_id)) {
                clashes.push(format!("subject {} belongs to school {}", s.id, other.school_id));
            }
        }
        for t in &teachers {
            if let Some(other) = w.teachers.get(&t.id).filter(|x| foreign(&x.school_id)) {
                clashes.push(format!("teacher {} belongs to school {}", t.id, other.school_id));
            }
        }
        for st in &streams {
            if let Some(other) = w.streams.get(&st.id).filter(|x| foreign(&x.school_id)) {
                clashes.push(format!("stream {} belongs to school {}", st.id, other.school_id));
            }
        }
        if !clashes.is_empty() {
            return Err(StoreError::Conflict(clashes.join("; ")).into());
        }

        if let Some(t) = template {
            school.template_id = Some(t.id.clone());
            w.templates.entry(t.id.clone()).or_insert(t);
        }
        w.subjects.retain(|_, s| s.school_id != id);
        w.teachers.retain(|_, t| t.school_id != id);
        w.streams.retain(|_, s| s.school_id != id);
        for s in subjects {
            w.subjects.insert(s.id.clone(), s);
        }
        for t in teachers {
            w.teachers.insert(t.id.clone(), t);
        }
        for s in streams {
            w.streams.insert(s.id.clone(), s);
        }
        let Tables {
            streams, timetables, ..
        } = &mut *w;
        timetables.retain(|tt| tt.school_id != id || streams.contains_key(&tt.stream_id));
        info!(school = %id, subjects = w.subjects.values().filter(|s| s.school_id == id).count(), "school imported");
        w.schools.insert(id, school);
        Ok(())
    }

    pub fn upsert_template(&self, template: Template) -> Result<(), ScheduleError> {
        validate_template(&template)?;
        self.inner.write().templates.insert(template.id.clone(), template);
        Ok(())
    }

    pub fn delete_school(&self, id: &SchoolId) -> Result<(), ScheduleError> {
        let mut w = self.inner.write();
        if w.schools.remove(id).is_none() {
            return Err(ScheduleError::not_found("school", id));
        }
        w.subjects.retain(|_, s| &s.school_id != id);
        w.teachers.retain(|_, t| &t.school_id != id);
        w.streams.retain(|_, s| &s.school_id != id);
        w.timetables.retain(|tt| &tt.school_id != id);
        Ok(())
    }

    pub fn delete_teacher(&self, id: &TeacherId) -> Result<(), ScheduleError> {
        let mut w = self.inner.write();
        if w.teachers.remove(id).is_none() {
            return Err(ScheduleError::not_found("teacher", id));
        }
        for s in w.streams.values_mut() {
            if s.class_teacher.as_ref() == Some(id) {
                s.class_teacher = None;
            }
        }
        Ok(())
    }

    pub fn delete_subject(&self, id: &SubjectId) -> Result<(), ScheduleError> {
        let mut w = self.inner.write();
        if w.subjects.remove(id).is_none() {
            return Err(ScheduleError::not_found("subject", id));
        }
        for t in w.teachers.values_mut() {
            t.subjects.retain(|s| s != id);
        }
        for s in w.streams.values_mut() {
            s.curriculum.retain(|r| &r.subject_id != id);
        }
        Ok(())
    }

    pub fn delete_stream(&self, id: &StreamId) -> Result<(), ScheduleError> {
        let mut w = self.inner.write();
        if w.streams.remove(id).is_none() {
            return Err(ScheduleError::not_found("stream", id));
        }
        w.timetables.retain(|tt| &tt.stream_id != id);
        Ok(())
    }

    /// Latest timetable of every stream in every school.
    pub fn all_latest(&self) -> Vec<Timetable> {
        self.inner
            .read()
            .timetables
            .iter()
            .filter(|tt| tt.is_latest)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn school(&self, id: &SchoolId) -> Result<Option<School>, StoreError> {
        Ok(self.inner.read().schools.get(id).cloned())
    }

    async fn template(&self, id: &TemplateId) -> Result<Option<Template>, StoreError> {
        Ok(self.inner.read().templates.get(id).cloned())
    }

    async fn subjects(&self, school: &SchoolId) -> Result<Vec<Subject>, StoreError> {
        Ok(self
            .inner
            .read()
            .subjects
            .values()
            .filter(|s| &s.school_id == school)
            .cloned()
            .collect())
    }

    async fn teachers(&self, school: &SchoolId) -> Result<Vec<Teacher>, StoreError> {
        Ok(self
            .inner
            .read()
            .teachers
            .values()
            .filter(|t| &t.school_id == school)
            .cloned()
            .collect())
    }

    async fn streams(&self, school: &SchoolId) -> Result<Vec<Stream>, StoreError> {
        Ok(self
            .inner
            .read()
            .streams
            .values()
            .filter(|s| &s.school_id == school)
            .cloned()
            .collect())
    }

    async fn latest_timetable(&self, stream: &StreamId) -> Result<Option<Timetable>, StoreError> {
        Ok(self
            .inner
            .read()
            .timetables
            .iter()
            .rev()
            .find(|tt| &tt.stream_id == stream && tt.is_latest)
            .cloned())
    }

    async fn insert_timetable(&self, mut tt: Timetable) -> Result<(), StoreError> {
        let mut w = self.inner.write();
        if !w.streams.contains_key(&tt.stream_id) {
            return Err(StoreError::Conflict(format!(
                "stream {} no longer exists",
                tt.stream_id
            )));
        }
        if w.timetables.iter().any(|old| old.id == tt.id) {
            return Err(StoreError::Conflict(format!("timetable {} already stored", tt.id)));
        }
        for old in w.timetables.iter_mut().filter(|old| old.stream_id == tt.stream_id) {
            old.is_latest = false;
        }
        tt.is_latest = true;
        w.timetables.push(tt);
        Ok(())
    }

    async fn retire_latest(&self, stream: &StreamId) -> Result<Option<TimetableId>, StoreError> {
        let mut w = self.inner.write();
        let mut retired = None;
        for tt in w
            .timetables
            .iter_mut()
            .filter(|tt| &tt.stream_id == stream && tt.is_latest)
        {
            tt.is_latest = false;
            retired = Some(tt.id.clone());
        }
        Ok(retired)
    }

    async fn timetables(
        &self,
        school: &SchoolId,
        history: bool,
    ) -> Result<Vec<Timetable>, StoreError> {
        Ok(self
            .inner
            .read()
            .timetables
            .iter()
            .filter(|tt| &tt.school_id == school && (history || tt.is_latest))
            .cloned()
            .collect())
    }

    async fn timetable(&self, id: &TimetableId) -> Result<Option<Timetable>, StoreError> {
        Ok(self
            .inner
            .read()
            .timetables
            .iter()
            .find(|tt| &tt.id == id)
            .cloned())
    }

    async fn record_workloads(
        &self,
        school: &SchoolId,
        loads: &[(TeacherId, u32)],
    ) -> Result<(), StoreError> {
        let mut w = self.inner.write();
        for (id, load) in loads {
            if let Some(t) = w.teachers.get_mut(id).filter(|t| &t.school_id == school) {
                t.workload = *load;
            }
        }
        Ok(())
    }
}
