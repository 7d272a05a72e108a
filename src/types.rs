//! Core types for the Sleep Insights pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: typed daily records and habit definitions, normalized entries, and the
//! dashboard output (impact rows and aggregates).

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::InsightError;

/// Deserialize `null` as the type's default value.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Metric selectable on the dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    #[default]
    SleepScore,
    Duration,
    DeepSleep,
    BodyBattery,
    Hrv,
    Rhr,
}

impl Metric {
    /// All metrics in dashboard order
    pub const ALL: [Metric; 6] = [
        Metric::SleepScore,
        Metric::Duration,
        Metric::DeepSleep,
        Metric::BodyBattery,
        Metric::Hrv,
        Metric::Rhr,
    ];

    /// Stable key used by the persistence and presentation layers
    pub fn key(&self) -> &'static str {
        match self {
            Metric::SleepScore => "sleepScore",
            Metric::Duration => "duration",
            Metric::DeepSleep => "deepSleep",
            Metric::BodyBattery => "bodyBattery",
            Metric::Hrv => "hrv",
            Metric::Rhr => "rhr",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::SleepScore => "Sleep Score",
            Metric::Duration => "Duration",
            Metric::DeepSleep => "Deep Sleep",
            Metric::BodyBattery => "Body Battery",
            Metric::Hrv => "HRV",
            Metric::Rhr => "Resting HR",
        }
    }

    /// Display unit (empty for unitless scores)
    pub fn unit(&self) -> &'static str {
        match self {
            Metric::SleepScore | Metric::BodyBattery => "",
            Metric::Duration | Metric::DeepSleep => "h",
            Metric::Hrv => "ms",
            Metric::Rhr => "bpm",
        }
    }

    /// True when lower raw values are the desirable direction
    pub fn inverse(&self) -> bool {
        matches!(self, Metric::Rhr)
    }

    /// Decimal places used when rendering values of this metric
    pub fn display_decimals(&self) -> usize {
        match self {
            Metric::Duration | Metric::DeepSleep => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Metric {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| InsightError::UnknownMetric(s.to_string()))
    }
}

/// Declared data type of a habit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HabitType {
    #[default]
    Boolean,
    Number,
    Time,
    Select,
}

impl HabitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HabitType::Boolean => "boolean",
            HabitType::Number => "number",
            HabitType::Time => "time",
            HabitType::Select => "select",
        }
    }
}

/// A trackable behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitDefinition {
    /// Stable identifier, unique across the habit set
    pub id: String,
    /// Display name
    pub label: String,
    /// Declared type (absent or null means boolean)
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub habit_type: HabitType,
    /// Allowed values, meaningful only for select habits
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: Vec<String>,
    /// Set when the user archived the habit; archived habits are hidden from logging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
}

impl HabitDefinition {
    /// Create a boolean habit
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            habit_type: HabitType::Boolean,
            options: Vec::new(),
            archived_at: None,
            sort_order: None,
        }
    }

    pub fn with_type(mut self, habit_type: HabitType) -> Self {
        self.habit_type = habit_type;
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    /// Split a comma separated option list ("Light, Normal, Heavy")
    pub fn parse_options(input: &str) -> Vec<String> {
        input
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Time of day parsed from an "HH:MM" string
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    /// Parse "HH:MM" (a trailing ":SS" is tolerated and ignored)
    pub fn parse(input: &str) -> Option<Self> {
        let mut parts = input.trim().split(':');
        let hour = parts.next()?.trim().parse::<u8>().ok()?;
        let minute = parts.next()?.trim().parse::<u8>().ok()?;
        if let Some(seconds) = parts.next() {
            seconds.trim().parse::<u8>().ok().filter(|s| *s < 60)?;
        }
        if parts.next().is_some() {
            return None;
        }
        Self::new(hour, minute)
    }

    /// Decimal hours since midnight (23:30 -> 23.5)
    pub fn decimal_hours(&self) -> f64 {
        f64::from(self.hour) + f64::from(self.minute) / 60.0
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TimeOfDay::parse(&value).ok_or_else(|| format!("invalid time of day: {value:?}"))
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// Typed value recorded for a non-boolean habit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum HabitValue {
    Boolean(bool),
    Number(f64),
    Time(TimeOfDay),
    Select(String),
}

impl HabitValue {
    pub fn habit_type(&self) -> HabitType {
        match self {
            HabitValue::Boolean(_) => HabitType::Boolean,
            HabitValue::Number(_) => HabitType::Number,
            HabitValue::Time(_) => HabitType::Time,
            HabitValue::Select(_) => HabitType::Select,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            HabitValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<TimeOfDay> {
        match self {
            HabitValue::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_select(&self) -> Option<&str> {
        match self {
            HabitValue::Select(s) => Some(s),
            _ => None,
        }
    }

    /// Whether recording this value marks the habit as done for the day
    pub fn is_active(&self) -> bool {
        match self {
            HabitValue::Boolean(b) => *b,
            HabitValue::Number(n) => *n > 0.0,
            HabitValue::Time(_) => true,
            HabitValue::Select(s) => !s.is_empty(),
        }
    }
}

/// One calendar day of logged data, typed against the habit definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    /// Sleep score (0-100); absence excludes the day from analysis
    pub sleep_score: Option<f64>,
    pub duration_hours: Option<f64>,
    pub duration_minutes: Option<f64>,
    pub deep_hours: Option<f64>,
    pub deep_minutes: Option<f64>,
    pub body_battery: Option<f64>,
    /// Heart rate variability (ms)
    pub hrv: Option<f64>,
    /// Resting heart rate (bpm)
    pub rhr: Option<f64>,
    /// Habit ids marked done that day
    pub habits: BTreeSet<String>,
    pub habit_values: BTreeMap<String, HabitValue>,
    pub bedtime: Option<TimeOfDay>,
    pub notes: String,
}

impl DailyRecord {
    /// Create an empty record for a date (no score, no habits)
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            sleep_score: None,
            duration_hours: None,
            duration_minutes: None,
            deep_hours: None,
            deep_minutes: None,
            body_battery: None,
            hrv: None,
            rhr: None,
            habits: BTreeSet::new(),
            habit_values: BTreeMap::new(),
            bedtime: None,
            notes: String::new(),
        }
    }

    /// Eligible for analysis only when a sleep score is present
    pub fn is_eligible(&self) -> bool {
        self.sleep_score.is_some()
    }
}

/// Normalized, analysis-ready entry (eligible records only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub date: NaiveDate,
    pub sleep_score: f64,
    /// Total sleep in decimal hours, rounded to one decimal
    pub duration: f64,
    /// Deep sleep in decimal hours, rounded to one decimal
    pub deep_sleep: f64,
    pub body_battery: Option<f64>,
    pub hrv: Option<f64>,
    pub rhr: Option<f64>,
    pub habits: BTreeSet<String>,
    pub habit_values: BTreeMap<String, HabitValue>,
    pub bedtime: Option<TimeOfDay>,
    pub notes: String,
}

impl Entry {
    /// Value of the given metric for this day, if recorded
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::SleepScore => Some(self.sleep_score),
            Metric::Duration => Some(self.duration),
            Metric::DeepSleep => Some(self.deep_sleep),
            Metric::BodyBattery => self.body_battery,
            Metric::Hrv => self.hrv,
            Metric::Rhr => self.rhr,
        }
    }

    pub fn has_habit(&self, habit_id: &str) -> bool {
        self.habits.contains(habit_id)
    }

    pub fn habit_value(&self, habit_id: &str) -> Option<&HabitValue> {
        self.habit_values.get(habit_id)
    }

    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }
}

/// Comparison strategy that produced an impact value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactStrategy {
    /// Days with the habit vs days without it
    PresenceAbsence,
    /// High/late half vs low/early half of days with a recorded value
    MedianSplit,
    /// No two-group comparison was possible
    Unavailable,
}

/// Whether an impact points in the desirable direction for the metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactEffect {
    Favorable,
    Unfavorable,
    Neutral,
}

impl ImpactEffect {
    /// Classify from the impact sign and the metric polarity
    pub fn classify(impact: Option<f64>, inverse: bool) -> Self {
        match impact {
            Some(value) if value > 0.0 && !inverse => ImpactEffect::Favorable,
            Some(value) if value < 0.0 && inverse => ImpactEffect::Favorable,
            Some(value) if value != 0.0 => ImpactEffect::Unfavorable,
            _ => ImpactEffect::Neutral,
        }
    }
}

/// Impact of one habit (or one select option) on the selected metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactRow {
    pub habit_id: String,
    /// Display label ("Alcohol: Heavy" for select options)
    pub label: String,
    pub habit_type: HabitType,
    /// Select option this row analyzes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option: Option<String>,
    /// "(High vs Low)" or "(Late vs Early)" for median-split rows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_detail: Option<String>,
    pub strategy: ImpactStrategy,
    /// Difference in mean metric value between the compared groups
    pub impact: Option<f64>,
    /// Mean metric value over days the habit was present
    pub avg_metric: Option<f64>,
    /// Mean recorded value over days the habit was present (number habits)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_value: Option<f64>,
    /// Days where the habit was present (or the option matched)
    pub present_count: usize,
    /// Days in the complementary group
    pub absent_count: usize,
    pub significant: bool,
    pub effect: ImpactEffect,
}

/// Sleep debt over the recent window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SleepDebt {
    /// Target minus actual; positive means under target
    pub debt_hours: f64,
    pub target_hours: f64,
    pub actual_hours: f64,
    pub nights: usize,
}

impl SleepDebt {
    pub fn is_deficit(&self) -> bool {
        self.debt_hours > 0.0
    }
}

/// Bedtime hour with the best mean sleep score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalBedtime {
    pub hour: u8,
    /// "H:00 - (H+1):00"
    pub window: String,
    pub avg_sleep_score: f64,
    pub nights: usize,
}

/// Mean selected metric for one bedtime hour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BedtimeBucket {
    pub hour: u8,
    pub label: String,
    pub average: Option<f64>,
    pub count: usize,
}

/// Mean selected metric for one day of the week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdayBucket {
    pub weekday: Weekday,
    pub average: Option<f64>,
    pub count: usize,
}

/// Full output of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub metric: Metric,
    /// Eligible entries, ascending by date
    pub entries: Vec<Entry>,
    /// Ranked habit impact rows
    pub habit_impacts: Vec<ImpactRow>,
    pub recent_average: Option<f64>,
    pub sleep_debt: Option<SleepDebt>,
    pub optimal_bedtime: Option<OptimalBedtime>,
    pub bedtime_buckets: Vec<BedtimeBucket>,
    pub weekday_buckets: Vec<WeekdayBucket>,
}

impl DashboardStats {
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// The highest ranked significant row with a favorable effect
    pub fn top_habit(&self) -> Option<&ImpactRow> {
        self.habit_impacts
            .iter()
            .find(|row| row.significant && row.effect == ImpactEffect::Favorable)
    }
}
