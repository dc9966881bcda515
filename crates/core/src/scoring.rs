use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use types::Timetable;

use crate::serialize::{subject_tally, teacher_tally};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct QualityWeights {
    pub back_to_back: i32,
    pub workload_spread: i32,
    pub distribution_range: i32,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            back_to_back: 3,
            workload_spread: 1,
            distribution_range: 1,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Scores {
    pub back_to_back_streams: HashMap<String, i64>,
    pub back_to_back_total: i64,
    pub workload_spread: i64,
    pub distribution_range_streams: HashMap<String, i64>,
    pub distribution_range_total: i64,
    pub objective: f64,
}

/// Soft-quality breakdown of a set of timetables, lower is better.
pub fn compute_quality(timetables: &[Timetable], weights: QualityWeights) -> Scores {
    let mut back_to_back_streams = HashMap::new();
    let mut distribution_range_streams = HashMap::new();
    let mut all_cells = Vec::new();

    for tt in timetables {
        let stream = tt.stream_id.0.clone();

        let repeats: i64 = tt
            .timetable_data
            .0
            .iter()
            .map(|(_, row)| row.windows(2).filter(|w| w[0] == w[1]).count() as i64)
            .sum();
        if repeats != 0 {
            back_to_back_streams.insert(stream.clone(), repeats);
        }

        let counts = subject_tally(&tt.timetable_data);
        let max = counts.values().copied().max().unwrap_or(0) as i64;
        let min = counts.values().copied().min().unwrap_or(0) as i64;
        if max - min != 0 {
            distribution_range_streams.insert(stream, max - min);
        }

        all_cells.extend(tt.cells.iter().cloned());
    }

    let loads = teacher_tally(&all_cells);
    let workload_spread = match (loads.values().max(), loads.values().min()) {
        (Some(&hi), Some(&lo)) => (hi - lo) as i64,
        _ => 0,
    };

    let back_to_back_total: i64 = back_to_back_streams.values().sum();
    let distribution_range_total: i64 = distribution_range_streams.values().sum();
    let objective = weights.back_to_back as f64 * back_to_back_total as f64
        + weights.workload_spread as f64 * workload_spread as f64
        + weights.distribution_range as f64 * distribution_range_total as f64;

    Scores {
        back_to_back_streams,
        back_to_back_total,
        workload_spread,
        distribution_range_streams,
        distribution_range_total,
        objective,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use types::{
        CellAssignment, SchoolId, StreamId, StructureConfig, SubjectId, TeacherId, Template,
        TemplateId, TimetableData, TimetableId,
    };

    fn timetable(stream: &str, rows: &[&[&str]], teachers: &[&str]) -> Timetable {
        let mut cells = Vec::new();
        let mut k = 0;
        for (d, row) in rows.iter().enumerate() {
            for (p, s) in row.iter().enumerate() {
                cells.push(CellAssignment {
                    day: d as u8,
                    period: p as u8,
                    subject_id: SubjectId::from(*s),
                    teacher_id: TeacherId::from(teachers[k % teachers.len()]),
                });
                k += 1;
            }
        }
        Timetable {
            id: TimetableId::from("tt"),
            school_id: SchoolId::from("s"),
            stream_id: StreamId::from(stream),
            generated_at: Utc::now(),
            generated_by: None,
            template_type: "classic".into(),
            template: Template {
                id: TemplateId::from("tpl"),
                name: "t".into(),
                school_type: Default::default(),
                periods_per_day: rows[0].len() as u8,
                period_duration: 40,
                days_per_week: rows.len() as u8,
                start_time: "08:00".into(),
                end_time: "16:00".into(),
                break_config: vec![],
                structure_config: StructureConfig::default(),
            },
            cells,
            timetable_data: TimetableData(
                rows.iter()
                    .enumerate()
                    .map(|(d, r)| (format!("D{d}"), r.iter().map(|s| s.to_string()).collect()))
                    .collect(),
            ),
            is_latest: true,
        }
    }

    #[test]
    fn counts_repeats_spread_and_range() {
        let a = timetable("a", &[&["M", "M", "E"], &["E", "M", "E"]], &["t1", "t2"]);
        let s = compute_quality(&[a], QualityWeights::default());
        assert_eq!(s.back_to_back_total, 1);
        assert_eq!(s.distribution_range_total, 0);
        assert_eq!(s.workload_spread, 0);
        assert_eq!(s.objective, 3.0);
    }

    #[test]
    fn balanced_week_scores_zero() {
        let a = timetable("a", &[&["M", "E"], &["E", "M"]], &["t1"]);
        let s = compute_quality(&[a], QualityWeights::default());
        assert_eq!(s.objective, 0.0);
        assert!(s.back_to_back_streams.is_empty());
    }
}
