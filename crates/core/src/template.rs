//! Template invariants and the period clock derived from a template.

use chrono::{Duration, NaiveTime};
use serde::Serialize;
use std::collections::HashSet;
use types::{Template, MAX_PERIODS_PER_DAY};

use crate::ScheduleError;

fn parse_clock(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").ok()
}

/// Every template invariant violation, in a stable order.
pub fn template_errors(t: &Template) -> Vec<String> {
    let mut errors = Vec::new();
    let id = &t.id;

    if t.periods_per_day == 0 || t.periods_per_day > MAX_PERIODS_PER_DAY {
        errors.push(format!(
            "template {id}: periods_per_day must be within 1..={MAX_PERIODS_PER_DAY}, got {}",
            t.periods_per_day
        ));
    }
    if !(5..=7).contains(&t.days_per_week) {
        errors.push(format!(
            "template {id}: days_per_week must be within 5..=7, got {}",
            t.days_per_week
        ));
    }
    if t.period_duration == 0 {
        errors.push(format!("template {id}: period_duration must be positive"));
    }

    let mut after = HashSet::new();
    for b in &t.break_config {
        if b.after_period < 1 || b.after_period >= t.periods_per_day {
            errors.push(format!(
                "template {id}: break '{}' after period {} is outside 1..={}",
                b.label,
                b.after_period,
                t.periods_per_day.saturating_sub(1)
            ));
        }
        if !after.insert(b.after_period) {
            errors.push(format!(
                "template {id}: more than one break after period {}",
                b.after_period
            ));
        }
        if b.duration == 0 {
            errors.push(format!("template {id}: break '{}' has zero duration", b.label));
        }
    }

    let sc = &t.structure_config;
    if !sc.days.is_empty() && sc.days.len() != t.days_per_week as usize {
        errors.push(format!(
            "template {id}: {} day labels for {} days",
            sc.days.len(),
            t.days_per_week
        ));
    }
    if !sc.periods.is_empty() && sc.periods.len() != t.periods_per_day as usize {
        errors.push(format!(
            "template {id}: {} period labels for {} periods",
            sc.periods.len(),
            t.periods_per_day
        ));
    }
    let mut labels = HashSet::new();
    for d in &sc.days {
        if !labels.insert(d.as_str()) {
            errors.push(format!("template {id}: duplicate day label {d}"));
        }
    }

    match (parse_clock(&t.start_time), parse_clock(&t.end_time)) {
        (Some(start), Some(end)) => {
            let teaching = t.period_duration as i64 * t.periods_per_day as i64;
            let breaks: i64 = t.break_config.iter().map(|b| b.duration as i64).sum();
            let needed = Duration::minutes(teaching + breaks);
            if end <= start {
                errors.push(format!("template {id}: end_time must be after start_time"));
            } else if end - start < needed {
                errors.push(format!(
                    "template {id}: day needs {} minutes but {}..{} allows {}",
                    needed.num_minutes(),
                    t.start_time,
                    t.end_time,
                    (end - start).num_minutes()
                ));
            }
        }
        _ => errors.push(format!(
            "template {id}: start_time/end_time must be HH:MM, got {}/{}",
            t.start_time, t.end_time
        )),
    }

    errors
}

pub fn validate_template(t: &Template) -> Result<(), ScheduleError> {
    let errors = template_errors(t);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ScheduleError::InvalidInput(errors.join("; ")))
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DayEntry {
    Period {
        number: u8,
        label: String,
        start: String,
        end: String,
    },
    Break {
        label: String,
        start: String,
        end: String,
    },
}

/// The school day as shown in a timetable header: periods with their clock
/// times and the breaks between them.
pub fn period_windows(t: &Template) -> Result<Vec<DayEntry>, ScheduleError> {
    validate_template(t)?;
    let mut clock = parse_clock(&t.start_time)
        .ok_or_else(|| ScheduleError::InvalidInput(format!("bad start_time {}", t.start_time)))?;
    let fmt = |n: NaiveTime| n.format("%H:%M").to_string();

    let mut out = Vec::with_capacity(t.periods_per_day as usize + t.break_config.len());
    for p in 1..=t.periods_per_day {
        let end = clock + Duration::minutes(t.period_duration as i64);
        let label = t
            .structure_config
            .periods
            .get(p as usize - 1)
            .cloned()
            .unwrap_or_else(|| format!("Period {p}"));
        out.push(DayEntry::Period {
            number: p,
            label,
            start: fmt(clock),
            end: fmt(end),
        });
        clock = end;
        if let Some(b) = t.break_config.iter().find(|b| b.after_period == p) {
            let end = clock + Duration::minutes(b.duration as i64);
            out.push(DayEntry::Break {
                label: b.label.clone(),
                start: fmt(clock),
                end: fmt(end),
            });
            clock = end;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{Break, StructureConfig, TemplateId};

    fn tpl() -> Template {
        Template {
            id: TemplateId::from("tpl"),
            name: "Junior".into(),
            school_type: Default::default(),
            periods_per_day: 6,
            period_duration: 40,
            days_per_week: 5,
            start_time: "08:00".into(),
            end_time: "13:00".into(),
            break_config: vec![Break {
                after_period: 3,
                duration: 20,
                label: "Tea".into(),
            }],
            structure_config: StructureConfig::default(),
        }
    }

    #[test]
    fn valid_template_passes() {
        assert!(template_errors(&tpl()).is_empty());
    }

    #[test]
    fn break_after_last_period_is_rejected() {
        let mut t = tpl();
        t.break_config[0].after_period = 6;
        let errs = template_errors(&t);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("after period 6"));
    }

    #[test]
    fn overlapping_breaks_are_rejected() {
        let mut t = tpl();
        t.break_config.push(Break {
            after_period: 3,
            duration: 5,
            label: "Second".into(),
        });
        assert!(template_errors(&t)
            .iter()
            .any(|e| e.contains("more than one break")));
    }

    #[test]
    fn day_must_fit_between_start_and_end() {
        let mut t = tpl();
        t.end_time = "11:00".into();
        assert!(template_errors(&t).iter().any(|e| e.contains("needs 260 minutes")));
    }

    #[test]
    fn label_counts_must_match_grid() {
        let mut t = tpl();
        t.structure_config.days = vec!["A".into(), "B".into()];
        t.structure_config.periods = vec!["1".into()];
        assert_eq!(template_errors(&t).len(), 2);
    }

    #[test]
    fn period_clock_inserts_breaks_without_extra_periods() {
        let entries = period_windows(&tpl()).unwrap();
        let periods = entries
            .iter()
            .filter(|e| matches!(e, DayEntry::Period { .. }))
            .count();
        assert_eq!(periods, 6);
        assert_eq!(entries.len(), 7);
        assert_eq!(
            entries[3],
            DayEntry::Break {
                label: "Tea".into(),
                start: "10:00".into(),
                end: "10:20".into(),
            }
        );
        assert_eq!(
            entries[6],
            DayEntry::Period {
                number: 6,
                label: "Period 6".into(),
                start: "11:40".into(),
                end: "12:20".into(),
            }
        );
    }
}
