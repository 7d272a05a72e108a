//! Raw daily log schema
//!
//! The persistence layer stores one JSON document per calendar date, keyed by
//! `YYYY-MM-DD`. Field names are camelCase and every field is optional:
//!
//! ```json
//! {
//!   "2024-01-15": {
//!     "sleepScore": 85, "durationHours": 7, "durationMinutes": 30,
//!     "habits": ["meditation"], "habitValues": {"screen_time": 2.5},
//!     "bedtime": "23:15", "notes": ""
//!   }
//! }
//! ```
//!
//! Values arrive loosely typed (form inputs may store numbers as strings), so every
//! scalar is captured as a [`RawValue`] and interpreted later by the adapter.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{null_as_default, DailyRecord, HabitValue};

/// Raw daily log: date key -> record
pub type RawLog = BTreeMap<String, RawDailyRecord>;

/// Flexible JSON value (supports whatever the form layer stored)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Integer(i64),
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Arrays, objects, null inside maps
    Other(serde_json::Value),
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
            RawValue::Integer(v as i64)
        } else {
            RawValue::Number(v)
        }
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Integer(v)
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        RawValue::Text(v)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::Text(v.to_string())
    }
}

impl From<bool> for RawValue {
    fn from(v: bool) -> Self {
        RawValue::Boolean(v)
    }
}

impl RawValue {
    /// Finite number, accepting numeric strings
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            RawValue::Integer(i) => *i as f64,
            RawValue::Number(n) => *n,
            RawValue::Text(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        value.is_finite().then_some(value)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RawValue::Boolean(b) => Some(*b),
            RawValue::Integer(0) => Some(false),
            RawValue::Integer(1) => Some(true),
            RawValue::Text(s) => match s.trim() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Other(serde_json::Value::Null))
    }
}

/// One day as stored by the persistence layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDailyRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_score: Option<RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_hours: Option<RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_minutes: Option<RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_battery: Option<RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hrv: Option<RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rhr: Option<RawValue>,
    /// Habit ids marked done
    #[serde(default, deserialize_with = "null_as_default")]
    pub habits: Vec<RawValue>,
    /// Values for non-boolean habits, keyed by habit id
    #[serde(default, deserialize_with = "null_as_default")]
    pub habit_values: BTreeMap<String, RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedtime: Option<RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<RawValue>,
    /// Fields this crate does not interpret, preserved on write-back
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl RawDailyRecord {
    /// Raw metric fields as (camelCase name, value) pairs
    pub fn metric_fields(&self) -> [(&'static str, Option<&RawValue>); 8] {
        [
            ("sleepScore", self.sleep_score.as_ref()),
            ("durationHours", self.duration_hours.as_ref()),
            ("durationMinutes", self.duration_minutes.as_ref()),
            ("deepHours", self.deep_hours.as_ref()),
            ("deepMinutes", self.deep_minutes.as_ref()),
            ("bodyBattery", self.body_battery.as_ref()),
            ("hrv", self.hrv.as_ref()),
            ("rhr", self.rhr.as_ref()),
        ]
    }
}

impl From<&HabitValue> for RawValue {
    fn from(value: &HabitValue) -> Self {
        match value {
            HabitValue::Boolean(b) => RawValue::Boolean(*b),
            HabitValue::Number(n) => RawValue::from(*n),
            HabitValue::Time(t) => RawValue::Text(t.to_string()),
            HabitValue::Select(s) => RawValue::Text(s.clone()),
        }
    }
}

impl From<&DailyRecord> for RawDailyRecord {
    fn from(record: &DailyRecord) -> Self {
        let number = |v: Option<f64>| v.map(RawValue::from);
        RawDailyRecord {
            sleep_score: number(record.sleep_score),
            duration_hours: number(record.duration_hours),
            duration_minutes: number(record.duration_minutes),
            deep_hours: number(record.deep_hours),
            deep_minutes: number(record.deep_minutes),
            body_battery: number(record.body_battery),
            hrv: number(record.hrv),
            rhr: number(record.rhr),
            habits: record.habits.iter().map(|id| RawValue::Text(id.clone())).collect(),
            habit_values: record
                .habit_values
                .iter()
                .map(|(id, value)| (id.clone(), RawValue::from(value)))
                .collect(),
            bedtime: record.bedtime.map(|t| RawValue::Text(t.to_string())),
            notes: Some(RawValue::Text(record.notes.clone())),
            extra: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimeOfDay;
    use chrono::NaiveDate;

    #[test]
    fn test_deserialize_loose_record() {
        let json = r#"{
            "sleepScore": 85,
            "durationHours": "7",
            "durationMinutes": 30.0,
            "bodyBattery": null,
            "habits": ["meditation", "read"],
            "habitValues": {"screen_time": "2.5", "bedtime_snack": null, "alcohol": "Light"},
            "bedtime": "23:15",
            "syncedBy": "phone"
        }"#;

        let record: RawDailyRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.sleep_score, Some(RawValue::Integer(85)));
        assert_eq!(record.duration_hours.as_ref().and_then(RawValue::as_f64), Some(7.0));
        assert_eq!(record.duration_minutes.as_ref().and_then(RawValue::as_f64), Some(30.0));
        assert!(record.body_battery.is_none());
        assert_eq!(record.habits.len(), 2);
        assert!(record.habit_values["bedtime_snack"].is_null());
        assert_eq!(record.habit_values["screen_time"].as_f64(), Some(2.5));
        assert_eq!(record.extra["syncedBy"], "phone");
    }

    #[test]
    fn test_null_collections() {
        let record: RawDailyRecord =
            serde_json::from_str(r#"{"habits": null, "habitValues": null}"#).unwrap();
        assert!(record.habits.is_empty());
        assert!(record.habit_values.is_empty());
    }

    #[test]
    fn test_raw_value_interpretation() {
        assert_eq!(RawValue::Text(" 42 ".to_string()).as_f64(), Some(42.0));
        assert_eq!(RawValue::Text("NaN".to_string()).as_f64(), None);
        assert_eq!(RawValue::Text("".to_string()).as_f64(), None);
        assert_eq!(RawValue::Boolean(true).as_f64(), None);
        assert_eq!(RawValue::Integer(1).as_bool(), Some(true));
        assert_eq!(RawValue::from(7.0), RawValue::Integer(7));
        assert_eq!(RawValue::from(7.5), RawValue::Number(7.5));
    }

    #[test]
    fn test_write_back_from_typed_record() {
        let mut record = DailyRecord::empty(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        record.sleep_score = Some(82.0);
        record.habits.insert("read".to_string());
        record
            .habit_values
            .insert("wind_down".to_string(), HabitValue::Time(TimeOfDay::new(22, 45).unwrap()));
        record.bedtime = TimeOfDay::new(23, 5);

        let raw = RawDailyRecord::from(&record);
        let json = serde_json::to_value(&raw).unwrap();
        assert_eq!(json["sleepScore"], 82);
        assert_eq!(json["habits"][0], "read");
        assert_eq!(json["habitValues"]["wind_down"], "22:45");
        assert_eq!(json["bedtime"], "23:05");
        assert!(json.get("bodyBattery").is_none());
    }
}
