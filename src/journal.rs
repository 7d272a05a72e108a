//! Daily journal edits
//!
//! Operations used by the logging side of the application: marking habits done,
//! recording habit values and storing the night's sleep metrics. The reference
//! date is always passed in by the caller.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::{InsightError, Result};
use crate::schema::{RawDailyRecord, RawLog, RawLogAdapter, DATE_FORMAT};
use crate::types::{DailyRecord, HabitDefinition, HabitType, HabitValue, TimeOfDay};

/// Sleep is logged for the previous night
pub fn default_entry_date(today: NaiveDate) -> NaiveDate {
    today.pred_opt().unwrap_or(today)
}

/// Habit id derived from a display label ("Hot Shower" -> "hot_shower")
pub fn habit_id_from_label(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Habits seeded when the habit collection is empty
pub fn default_habits() -> Vec<HabitDefinition> {
    [
        ("caffeine", "No caffeine after 2 PM"),
        ("screens", "No screens 1h before bed"),
        ("read", "Read a book"),
        ("magnesium", "Took Magnesium"),
        ("meditation", "Meditation (10m)"),
        ("hot_shower", "Hot shower/bath"),
    ]
    .into_iter()
    .map(|(id, label)| HabitDefinition::new(id, label))
    .collect()
}

/// One night of sleep as entered on the sleep form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SleepMetrics {
    pub sleep_score: f64,
    pub duration_hours: Option<f64>,
    pub duration_minutes: Option<f64>,
    pub deep_hours: Option<f64>,
    pub deep_minutes: Option<f64>,
    pub body_battery: Option<f64>,
    pub hrv: Option<f64>,
    pub rhr: Option<f64>,
    pub bedtime: Option<TimeOfDay>,
    pub notes: String,
}

/// Typed daily log keyed by date
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyLog {
    records: BTreeMap<NaiveDate, DailyRecord>,
}

impl DailyLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from typed records; a later record replaces an earlier one for the same date
    pub fn from_records(records: impl IntoIterator<Item = DailyRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.date, r)).collect(),
        }
    }

    /// Type a raw log against the habit definitions
    pub fn from_raw(log: &RawLog, habits: &[HabitDefinition]) -> Self {
        Self::from_records(RawLogAdapter::to_records(log, habits))
    }

    /// Write every record back into a raw log, keeping fields this crate does not interpret
    pub fn merge_into(&self, log: &mut RawLog) {
        for date in self.records.keys() {
            self.merge_day_into(*date, log);
        }
    }

    /// Write one day back, leaving the rest of the raw log untouched
    pub fn merge_day_into(&self, date: NaiveDate, log: &mut RawLog) {
        let Some(record) = self.records.get(&date) else {
            return;
        };
        let key = date.format(DATE_FORMAT).to_string();
        let mut raw = RawDailyRecord::from(record);
        if let Some(existing) = log.remove(&key) {
            raw.extra = existing.extra;
        }
        log.insert(key, raw);
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DailyRecord> {
        self.records.get(&date)
    }

    /// Records ascending by date
    pub fn records(&self) -> impl Iterator<Item = &DailyRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The record for a date, created empty if missing
    pub fn ensure_day(&mut self, date: NaiveDate) -> &mut DailyRecord {
        self.records
            .entry(date)
            .or_insert_with(|| DailyRecord::empty(date))
    }

    /// Flip a habit's done state; returns whether it is now done
    pub fn toggle_habit(&mut self, date: NaiveDate, habit_id: &str) -> bool {
        let record = self.ensure_day(date);
        if record.habits.remove(habit_id) {
            false
        } else {
            record.habits.insert(habit_id.to_string());
            true
        }
    }

    /// Store a typed value; the habit is done exactly when the value is active
    pub fn set_habit_value(&mut self, date: NaiveDate, habit: &HabitDefinition, value: HabitValue) {
        let record = self.ensure_day(date);
        if value.is_active() {
            record.habits.insert(habit.id.clone());
        } else {
            record.habits.remove(&habit.id);
        }
        record.habit_values.insert(habit.id.clone(), value);
    }

    /// Parse form input for a habit and store it.
    ///
    /// Number input that does not parse is stored as 0.
    pub fn set_habit_input(
        &mut self,
        date: NaiveDate,
        habit: &HabitDefinition,
        input: &str,
    ) -> Result<HabitValue> {
        let input = input.trim();
        let value = match habit.habit_type {
            HabitType::Number => HabitValue::Number(
                input.parse::<f64>().ok().filter(|n| n.is_finite()).unwrap_or(0.0),
            ),
            HabitType::Time => TimeOfDay::parse(input).map(HabitValue::Time).ok_or_else(|| {
                InsightError::InvalidHabitValue(format!("{}: {input:?} is not HH:MM", habit.id))
            })?,
            HabitType::Select => HabitValue::Select(input.to_string()),
            HabitType::Boolean => match input {
                "true" | "yes" | "1" => HabitValue::Boolean(true),
                "false" | "no" | "0" | "" => HabitValue::Boolean(false),
                other => {
                    return Err(InsightError::InvalidHabitValue(format!(
                        "{}: {other:?} is not a boolean",
                        habit.id
                    )))
                }
            },
        };

        self.set_habit_value(date, habit, value.clone());
        Ok(value)
    }

    /// Overwrite the night's metrics, keeping the day's habits and habit values
    ///
    /// Missing duration parts are stored as 0. Missing optional readings stay absent.
    pub fn record_sleep(&mut self, date: NaiveDate, metrics: SleepMetrics) {
        let zero = |v: Option<f64>| Some(v.unwrap_or(0.0));
        let record = self.ensure_day(date);
        record.sleep_score = Some(metrics.sleep_score);
        record.duration_hours = zero(metrics.duration_hours);
        record.duration_minutes = zero(metrics.duration_minutes);
        record.deep_hours = zero(metrics.deep_hours);
        record.deep_minutes = zero(metrics.deep_minutes);
        record.body_battery = metrics.body_battery;
        record.hrv = metrics.hrv;
        record.rhr = metrics.rhr;
        record.bedtime = metrics.bedtime;
        record.notes = metrics.notes;
    }

    /// Percentage of active (non-archived) habits done on a date
    pub fn consistency(&self, date: NaiveDate, habits: &[HabitDefinition]) -> f64 {
        let active: Vec<&HabitDefinition> = habits.iter().filter(|h| !h.is_archived()).collect();
        if active.is_empty() {
            return 0.0;
        }
        let done = self
            .get(date)
            .map(|record| active.iter().filter(|h| record.habits.contains(&h.id)).count())
            .unwrap_or(0);
        done as f64 / active.len() as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn test_default_entry_date_is_yesterday() {
        assert_eq!(default_entry_date(date(1)), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_habit_id_from_label() {
        assert_eq!(habit_id_from_label("Hot  Shower"), "hot_shower");
        assert_eq!(habit_id_from_label(" Screen time "), "screen_time");
    }

    #[test]
    fn test_default_habits() {
        let habits = default_habits();
        assert_eq!(habits.len(), 6);
        assert_eq!(habits[4].id, "meditation");
        assert!(habits.iter().all(|h| h.habit_type == HabitType::Boolean));
    }

    #[test]
    fn test_toggle_habit() {
        let mut log = DailyLog::new();
        assert!(log.toggle_habit(date(5), "read"));
        assert!(log.get(date(5)).unwrap().habits.contains("read"));
        assert_eq!(log.get(date(5)).unwrap().sleep_score, None);
        assert!(!log.toggle_habit(date(5), "read"));
        assert!(log.get(date(5)).unwrap().habits.is_empty());
    }

    #[test]
    fn test_number_input_marks_done() {
        let habit = HabitDefinition::new("screen_time", "Screen time").with_type(HabitType::Number);
        let mut log = DailyLog::new();

        log.set_habit_input(date(5), &habit, "2.5").unwrap();
        assert!(log.get(date(5)).unwrap().habits.contains("screen_time"));

        let value = log.set_habit_input(date(5), &habit, "abc").unwrap();
        assert_eq!(value, HabitValue::Number(0.0));
        let record = log.get(date(5)).unwrap();
        assert!(!record.habits.contains("screen_time"));
        // Inactive values are still stored
        assert_eq!(record.habit_values.get("screen_time"), Some(&HabitValue::Number(0.0)));
    }

    #[test]
    fn test_time_and_select_input() {
        let meal = HabitDefinition::new("last_meal", "Last meal").with_type(HabitType::Time);
        let alcohol = HabitDefinition::new("alcohol", "Alcohol")
            .with_type(HabitType::Select)
            .with_options(["None", "Light"]);
        let mut log = DailyLog::new();

        log.set_habit_input(date(5), &meal, "20:15").unwrap();
        assert!(matches!(
            log.set_habit_input(date(5), &meal, "dinner"),
            Err(InsightError::InvalidHabitValue(_))
        ));
        log.set_habit_input(date(5), &alcohol, "").unwrap();

        let record = log.get(date(5)).unwrap();
        assert!(record.habits.contains("last_meal"));
        assert!(!record.habits.contains("alcohol"));
    }

    #[test]
    fn test_record_sleep_keeps_habits() {
        let mut log = DailyLog::new();
        log.toggle_habit(date(5), "read");
        log.record_sleep(
            date(5),
            SleepMetrics {
                sleep_score: 82.0,
                duration_hours: Some(7.0),
                notes: "woke once".to_string(),
                ..SleepMetrics::default()
            },
        );

        let record = log.get(date(5)).unwrap();
        assert_eq!(record.sleep_score, Some(82.0));
        assert_eq!(record.duration_hours, Some(7.0));
        assert_eq!(record.duration_minutes, Some(0.0));
        assert_eq!(record.hrv, None);
        assert_eq!(record.rhr, None);
        assert_eq!(record.bedtime, None);
        assert!(record.habits.contains("read"));
    }

    #[test]
    fn test_night_without_hrv_is_left_out_of_average() {
        use crate::aggregates::AggregateCalculator;
        use crate::config::AnalyzerConfig;
        use crate::normalizer::EntryNormalizer;
        use crate::types::Metric;

        let mut log = DailyLog::new();
        log.record_sleep(
            date(5),
            SleepMetrics { sleep_score: 80.0, hrv: Some(60.0), ..SleepMetrics::default() },
        );
        log.record_sleep(date(6), SleepMetrics { sleep_score: 75.0, ..SleepMetrics::default() });

        let records: Vec<DailyRecord> = log.records().cloned().collect();
        let entries = EntryNormalizer::normalize(&records);
        assert_eq!(entries.len(), 2);

        let config = AnalyzerConfig::default();
        let calc = AggregateCalculator::new(&config, Metric::Hrv);
        assert_eq!(calc.recent_average(&entries), Some(60.0));
    }

    #[test]
    fn test_consistency_ignores_archived() {
        let mut habits = default_habits();
        habits[0].archived_at = Some("2024-02-01".to_string());
        habits[1].archived_at = Some("2024-02-01".to_string());

        let mut log = DailyLog::new();
        log.toggle_habit(date(5), "read");
        log.toggle_habit(date(5), "caffeine");

        assert!((log.consistency(date(5), &habits) - 25.0).abs() < 1e-9);
        assert_eq!(log.consistency(date(6), &habits), 0.0);
        assert_eq!(log.consistency(date(5), &[]), 0.0);
    }

    #[test]
    fn test_merge_into_preserves_unknown_fields() {
        let mut raw = RawLogAdapter::parse_log(r#"{"2024-03-05": {"sleepScore": 70, "syncedBy": "phone"}}"#)
            .unwrap();
        let mut log = DailyLog::from_raw(&raw, &[]);
        log.toggle_habit(date(5), "read");
        log.toggle_habit(date(6), "read");
        log.merge_into(&mut raw);

        assert_eq!(raw.len(), 2);
        let day = &raw["2024-03-05"];
        assert_eq!(day.extra["syncedBy"], "phone");
        assert_eq!(day.habits.len(), 1);
        assert!(raw["2024-03-06"].sleep_score.is_none());
    }

    #[test]
    fn test_merge_day_into_touches_one_day() {
        let mut raw = RawLogAdapter::parse_log(
            r#"{"2024-03-04": {"sleepScore": 70, "habitValues": {"gone": 3}}}"#,
        )
        .unwrap();
        let mut log = DailyLog::from_raw(&raw, &[]);
        log.toggle_habit(date(5), "read");
        log.merge_day_into(date(5), &mut raw);

        // The untouched day keeps its orphaned value
        assert_eq!(raw["2024-03-04"].habit_values.len(), 1);
        assert_eq!(raw["2024-03-05"].habits.len(), 1);
    }
}
