//! Adapter for converting the raw daily log into typed records
//!
//! This is the ingestion boundary: loosely typed persistence values are validated
//! against the habit definitions once, here, so the analysis stages only ever see
//! [`DailyRecord`]s with typed [`HabitValue`]s. Malformed fields are dropped rather
//! than failing the document.

use crate::error::{InsightError, Result};
use crate::schema::raw_record::{RawDailyRecord, RawLog, RawValue};
use crate::types::{DailyRecord, HabitDefinition, HabitType, HabitValue, TimeOfDay};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

/// Date key format used by the persistence layer
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Adapter for converting raw log documents to typed records
pub struct RawLogAdapter;

impl RawLogAdapter {
    /// Parse a daily log JSON object (`{ "YYYY-MM-DD": record, ... }`)
    pub fn parse_log(json: &str) -> Result<RawLog> {
        let log: RawLog = serde_json::from_str(json)?;
        Ok(log)
    }

    /// Parse a JSON array of habit definitions
    pub fn parse_habits(json: &str) -> Result<Vec<HabitDefinition>> {
        let habits: Vec<HabitDefinition> = serde_json::from_str(json)?;
        Ok(habits)
    }

    /// Parse a `YYYY-MM-DD` date key
    pub fn parse_date(key: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(key.trim(), DATE_FORMAT)
            .map_err(|e| InsightError::DateParseError(format!("{key:?}: {e}")))
    }

    /// Convert the raw log to typed records, ascending by date.
    ///
    /// Records with an unparseable date key are skipped.
    pub fn to_records(log: &RawLog, habits: &[HabitDefinition]) -> Vec<DailyRecord> {
        let index = habit_index(habits);
        let mut records = Vec::with_capacity(log.len());

        for (key, raw) in log {
            match Self::parse_date(key) {
                Ok(date) => records.push(Self::to_record(date, raw, &index)),
                Err(e) => tracing::warn!(error = %e, "Skipping record with invalid date key"),
            }
        }

        records.sort_by_key(|r| r.date);
        tracing::debug!(
            raw = log.len(),
            typed = records.len(),
            "Converted raw log to typed records"
        );
        records
    }

    /// Convert one raw record
    pub fn to_record(
        date: NaiveDate,
        raw: &RawDailyRecord,
        habits: &HashMap<&str, &HabitDefinition>,
    ) -> DailyRecord {
        let number = |v: &Option<RawValue>| v.as_ref().and_then(RawValue::as_f64);

        let mut habit_values = std::collections::BTreeMap::new();
        for (id, value) in &raw.habit_values {
            let Some(habit) = habits.get(id.as_str()) else {
                tracing::trace!(%date, habit = %id, "Ignoring value for unknown habit");
                continue;
            };
            match typed_habit_value(habit, value) {
                Some(typed) => {
                    habit_values.insert(id.clone(), typed);
                }
                None => tracing::trace!(
                    %date,
                    habit = %id,
                    habit_type = habit.habit_type.as_str(),
                    "Dropping habit value that does not match the declared type"
                ),
            }
        }

        DailyRecord {
            date,
            sleep_score: number(&raw.sleep_score),
            duration_hours: number(&raw.duration_hours),
            duration_minutes: number(&raw.duration_minutes),
            deep_hours: number(&raw.deep_hours),
            deep_minutes: number(&raw.deep_minutes),
            body_battery: number(&raw.body_battery),
            hrv: number(&raw.hrv),
            rhr: number(&raw.rhr),
            habits: raw
                .habits
                .iter()
                .filter_map(RawValue::as_text)
                .map(str::to_string)
                .collect(),
            habit_values,
            bedtime: raw
                .bedtime
                .as_ref()
                .and_then(RawValue::as_text)
                .and_then(TimeOfDay::parse),
            notes: raw
                .notes
                .as_ref()
                .and_then(RawValue::as_text)
                .unwrap_or_default()
                .to_string(),
        }
    }

    /// Report every degradation the ingestion would apply
    pub fn validate(log: &RawLog, habits: &[HabitDefinition]) -> Vec<ValidationIssue> {
        let index = habit_index(habits);
        let mut issues = Vec::new();

        for (key, raw) in log {
            let mut push = |field: &str, severity: IssueSeverity, message: String| {
                issues.push(ValidationIssue {
                    date: key.clone(),
                    field: field.to_string(),
                    severity,
                    message,
                });
            };

            if let Err(e) = Self::parse_date(key) {
                push("date", IssueSeverity::Error, format!("{e}; record will be skipped"));
            }

            for (field, value) in raw.metric_fields() {
                let Some(value) = value.filter(|v| !v.is_null()) else {
                    continue;
                };
                match value.as_f64() {
                    None => push(
                        field,
                        IssueSeverity::Error,
                        format!("{value:?} is not a number; treated as absent"),
                    ),
                    Some(n) if field == "sleepScore" && !(0.0..=100.0).contains(&n) => push(
                        field,
                        IssueSeverity::Warning,
                        format!("sleep score {n} is outside 0-100"),
                    ),
                    Some(n) if n < 0.0 => push(
                        field,
                        IssueSeverity::Warning,
                        format!("negative value {n}"),
                    ),
                    Some(_) => {}
                }
            }

            if let Some(bedtime) = raw.bedtime.as_ref().filter(|v| !v.is_null()) {
                if bedtime.as_text().and_then(TimeOfDay::parse).is_none() {
                    push(
                        "bedtime",
                        IssueSeverity::Error,
                        format!("{bedtime:?} is not HH:MM; treated as absent"),
                    );
                }
            }

            for id in &raw.habits {
                match id.as_text() {
                    Some(id) if !index.contains_key(id) => push(
                        "habits",
                        IssueSeverity::Warning,
                        format!("unknown habit {id:?} is ignored"),
                    ),
                    Some(_) => {}
                    None => push(
                        "habits",
                        IssueSeverity::Error,
                        format!("{id:?} is not a habit id"),
                    ),
                }
            }

            for (id, value) in &raw.habit_values {
                if value.is_null() {
                    continue;
                }
                let field = format!("habitValues.{id}");
                let Some(habit) = index.get(id.as_str()) else {
                    push(&field, IssueSeverity::Warning, format!("unknown habit {id:?} is ignored"));
                    continue;
                };
                match typed_habit_value(habit, value) {
                    None => push(
                        &field,
                        IssueSeverity::Error,
                        format!(
                            "{value:?} does not match habit type {}; value dropped",
                            habit.habit_type.as_str()
                        ),
                    ),
                    Some(HabitValue::Select(option)) if !habit.options.contains(&option) => push(
                        &field,
                        IssueSeverity::Warning,
                        format!("{option:?} is not one of the declared options"),
                    ),
                    Some(_) => {}
                }
            }
        }

        issues
    }
}

/// Index habit definitions by id
pub fn habit_index(habits: &[HabitDefinition]) -> HashMap<&str, &HabitDefinition> {
    habits.iter().map(|h| (h.id.as_str(), h)).collect()
}

/// Interpret a raw value according to the habit's declared type
pub fn typed_habit_value(habit: &HabitDefinition, raw: &RawValue) -> Option<HabitValue> {
    match habit.habit_type {
        HabitType::Boolean => raw.as_bool().map(HabitValue::Boolean),
        HabitType::Number => raw.as_f64().map(HabitValue::Number),
        HabitType::Time => raw
            .as_text()
            .and_then(TimeOfDay::parse)
            .map(HabitValue::Time),
        HabitType::Select => raw
            .as_text()
            .filter(|s| !s.is_empty())
            .map(|s| HabitValue::Select(s.to_string())),
    }
}

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    /// Data is kept but looks suspicious
    Warning,
    /// Data will be dropped by ingestion
    Error,
}

/// One finding of [`RawLogAdapter::validate`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub date: String,
    pub field: String,
    pub severity: IssueSeverity,
    pub message: String,
}
