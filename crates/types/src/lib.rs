use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use utoipa::ToSchema;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Clone,
            Debug,
            Serialize,
            Deserialize,
            ToSchema,
            JsonSchema,
            Eq,
            PartialEq,
            Hash,
            PartialOrd,
            Ord,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}
id_newtype!(SchoolId);
id_newtype!(TeacherId);
id_newtype!(SubjectId);
id_newtype!(StreamId);
id_newtype!(TemplateId);
id_newtype!(TimetableId);

pub const DEFAULT_MAX_LESSONS_PER_WEEK: u32 = 25;
pub const MAX_PERIODS_PER_DAY: u8 = 16;

#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Mon,
        DayOfWeek::Tue,
        DayOfWeek::Wed,
        DayOfWeek::Thu,
        DayOfWeek::Fri,
        DayOfWeek::Sat,
        DayOfWeek::Sun,
    ];

    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn short(self) -> &'static str {
        match self {
            DayOfWeek::Mon => "Mon",
            DayOfWeek::Tue => "Tue",
            DayOfWeek::Wed => "Wed",
            DayOfWeek::Thu => "Thu",
            DayOfWeek::Fri => "Fri",
            DayOfWeek::Sat => "Sat",
            DayOfWeek::Sun => "Sun",
        }
    }

    /// Default column label used when a template carries no day labels.
    pub fn label(self) -> &'static str {
        match self {
            DayOfWeek::Mon => "Monday",
            DayOfWeek::Tue => "Tuesday",
            DayOfWeek::Wed => "Wednesday",
            DayOfWeek::Thu => "Thursday",
            DayOfWeek::Fri => "Friday",
            DayOfWeek::Sat => "Saturday",
            DayOfWeek::Sun => "Sunday",
        }
    }
}

/// One teachable cell of a weekly grid. Both coordinates are zero-based.
#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash, PartialOrd, Ord,
)]
pub struct Slot {
    pub day: u8,
    pub period: u8,
}

impl Slot {
    pub fn new(day: u8, period: u8) -> Self {
        Self { day, period }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DayOfWeek::from_index(self.day as usize) {
            Some(d) => write!(f, "{}/P{}", d.short(), self.period + 1),
            None => write!(f, "D{}/P{}", self.day + 1, self.period + 1),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchoolType {
    #[default]
    LowerPrimary,
    MiddlePrimary,
    JuniorHigh,
    SeniorHigh,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Break {
    pub after_period: u8,
    pub duration: u32,
    #[serde(default = "default_break_label")]
    pub label: String,
}

fn default_break_label() -> String {
    "Break".into()
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq, Eq)]
pub struct StructureConfig {
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub days: Vec<String>,
    #[serde(default)]
    pub periods: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq, Eq)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub school_type: SchoolType,
    pub periods_per_day: u8,
    pub period_duration: u32,
    pub days_per_week: u8,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub break_config: Vec<Break>,
    #[serde(default)]
    pub structure_config: StructureConfig,
}

impl Template {
    pub fn slots_per_week(&self) -> usize {
        self.periods_per_day as usize * self.days_per_week as usize
    }

    pub fn day_labels(&self) -> Vec<String> {
        if !self.structure_config.days.is_empty() {
            return self.structure_config.days.clone();
        }
        DayOfWeek::ALL
            .iter()
            .take(self.days_per_week as usize)
            .map(|d| d.label().to_string())
            .collect()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct School {
    pub id: SchoolId,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub school_type: SchoolType,
    #[serde(default)]
    pub template_id: Option<TemplateId>,
    /// Presentation style key copied onto generated rows.
    #[serde(default = "default_presentation")]
    pub timetable_template: String,
}

fn default_presentation() -> String {
    "classic".into()
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Subject {
    pub id: SubjectId,
    pub school_id: SchoolId,
    pub name: String,
}

/// Free periods (1-based) per day. A day missing from the map is not free.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq, Eq)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct Availability(pub BTreeMap<DayOfWeek, Vec<u8>>);

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Teacher {
    pub id: TeacherId,
    pub school_id: SchoolId,
    pub name: String,
    pub email: String,
    #[serde(default = "default_max_lessons")]
    pub max_lessons_per_week: u32,
    #[serde(default)]
    pub workload: u32,
    #[serde(default)]
    pub subjects: Vec<SubjectId>,
    #[serde(default)]
    pub availability: Option<Availability>,
}

fn default_max_lessons() -> u32 {
    DEFAULT_MAX_LESSONS_PER_WEEK
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRequirement {
    pub subject_id: SubjectId,
    #[serde(default)]
    pub lessons_per_week: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Stream {
    pub id: StreamId,
    pub school_id: SchoolId,
    pub grade: u8,
    pub stream_name: String,
    #[serde(default)]
    pub class_teacher: Option<TeacherId>,
    #[serde(default)]
    pub curriculum: Vec<SubjectRequirement>,
}

impl Stream {
    pub fn display_name(&self) -> String {
        format!("Grade {} - {}", self.grade, self.stream_name)
    }
}

/// Everything a school needs to request a timetable, as imported in one go.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct SchoolDataset {
    pub school: School,
    #[serde(default)]
    pub template: Option<Template>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub teachers: Vec<Teacher>,
    #[serde(default)]
    pub streams: Vec<Stream>,
}

/// Day label -> subject names in period order. Serialized as a JSON object
/// whose keys keep week order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TimetableData(pub Vec<(String, Vec<String>)>);

impl TimetableData {
    pub fn day(&self, label: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(d, _)| d == label)
            .map(|(_, v)| v.as_slice())
    }

    pub fn days(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(d, _)| d.as_str())
    }
}

impl Serialize for TimetableData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (day, subjects) in &self.0 {
            map.serialize_entry(day, subjects)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TimetableData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DaysVisitor;

        impl<'de> Visitor<'de> for DaysVisitor {
            type Value = TimetableData;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of day label to subject names")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((day, subjects)) = access.next_entry::<String, Vec<String>>()? {
                    out.push((day, subjects));
                }
                Ok(TimetableData(out))
            }
        }

        deserializer.deserialize_map(DaysVisitor)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq, Eq)]
pub struct CellAssignment {
    pub day: u8,
    pub period: u8,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
}

impl CellAssignment {
    pub fn slot(&self) -> Slot {
        Slot::new(self.day, self.period)
    }
}

/// A generated timetable as kept by the store, including the teacher of every
/// cell and the template it was built against.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Timetable {
    pub id: TimetableId,
    pub school_id: SchoolId,
    pub stream_id: StreamId,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub generated_by: Option<String>,
    pub template_type: String,
    pub template: Template,
    pub cells: Vec<CellAssignment>,
    #[schema(value_type = Object)]
    #[schemars(with = "serde_json::Value")]
    pub timetable_data: TimetableData,
    pub is_latest: bool,
}

impl Timetable {
    pub fn to_row(&self) -> TimetableRow {
        TimetableRow {
            id: self.id.clone(),
            school_id: self.school_id.clone(),
            stream_id: self.stream_id.clone(),
            generated_at: self.generated_at,
            generated_by: self.generated_by.clone(),
            template_type: self.template_type.clone(),
            timetable_data: self.timetable_data.clone(),
            is_latest: self.is_latest,
        }
    }
}

/// The externally visible shape of a timetable.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct TimetableRow {
    pub id: TimetableId,
    pub school_id: SchoolId,
    pub stream_id: StreamId,
    pub generated_at: DateTime<Utc>,
    pub generated_by: Option<String>,
    pub template_type: String,
    #[schema(value_type = Object)]
    #[schemars(with = "serde_json::Value")]
    pub timetable_data: TimetableData,
    pub is_latest: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub school_id: SchoolId,
    /// Regenerate only these streams; the rest keep their latest timetable
    /// and block their teachers' slots.
    #[serde(default)]
    pub streams: Option<Vec<StreamId>>,
    #[serde(default)]
    pub requested_by: Option<String>,
}

impl GenerateRequest {
    pub fn for_school(school_id: impl Into<String>) -> Self {
        Self {
            school_id: SchoolId(school_id.into()),
            streams: None,
            requested_by: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Unscheduled,
    InProgress,
    Complete,
    Infeasible,
}

impl StreamState {
    pub fn can_become(self, next: StreamState) -> bool {
        matches!(
            (self, next),
            (StreamState::Unscheduled, StreamState::InProgress)
                | (StreamState::Unscheduled, StreamState::Infeasible)
                | (StreamState::InProgress, StreamState::Complete)
                | (StreamState::InProgress, StreamState::Infeasible)
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InfeasibleReason {
    NoEligibleTeacher {
        subject: String,
    },
    InsufficientCapacity {
        subject: String,
        needed: u32,
        available: u32,
    },
    NoCandidate {
        subject: String,
        slot: Slot,
    },
    InvalidCurriculum {
        message: String,
    },
}

impl InfeasibleReason {
    pub fn subject(&self) -> Option<&str> {
        match self {
            InfeasibleReason::NoEligibleTeacher { subject }
            | InfeasibleReason::InsufficientCapacity { subject, .. }
            | InfeasibleReason::NoCandidate { subject, .. } => Some(subject),
            InfeasibleReason::InvalidCurriculum { .. } => None,
        }
    }
}

impl fmt::Display for InfeasibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfeasibleReason::NoEligibleTeacher { subject } => {
                write!(f, "no teacher is eligible to teach {subject}")
            }
            InfeasibleReason::InsufficientCapacity {
                subject,
                needed,
                available,
            } => write!(
                f,
                "{subject} needs {needed} lessons but eligible teachers can take at most {available} more"
            ),
            InfeasibleReason::NoCandidate { subject, slot } => {
                write!(f, "no eligible teacher free for {subject} at {slot}")
            }
            InfeasibleReason::InvalidCurriculum { message } => {
                write!(f, "invalid curriculum: {message}")
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StreamReport {
    pub stream_id: StreamId,
    pub name: String,
    pub state: StreamState,
    #[serde(default)]
    pub timetable_id: Option<TimetableId>,
    #[serde(default)]
    pub reason: Option<InfeasibleReason>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub budget_exhausted: bool,
    pub retries: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub school_id: SchoolId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub streams: Vec<StreamReport>,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.streams
            .iter()
            .filter(|s| s.state == StreamState::Complete)
            .count()
    }

    pub fn infeasible(&self) -> usize {
        self.streams
            .iter()
            .filter(|s| s.state == StreamState::Infeasible)
            .count()
    }
}
