//! Per-habit impact computation
//!
//! Every habit definition expands into one or more analysis units (a select habit
//! yields one unit per declared option). Each unit is compared against the selected
//! metric using the best strategy the data allows:
//!
//! 1. Presence/absence: mean over days with the habit minus mean over days without.
//! 2. Median split (number and time habits only, when there is no usable "without"
//!    group): order the days by recorded value and compare the upper half to the
//!    lower half.
//!
//! A row is significant only when a comparison was found and the habit was present
//! on at least `min_sample_size` days.

use std::cmp::Ordering;

use crate::config::AnalyzerConfig;
use crate::types::{
    Entry, HabitDefinition, HabitType, HabitValue, ImpactEffect, ImpactRow, ImpactStrategy,
    Metric,
};

/// One `(habit, option)` pair analyzed independently
#[derive(Debug, Clone, Copy)]
pub struct AnalysisUnit<'a> {
    pub habit: &'a HabitDefinition,
    /// The select option this unit tracks
    pub option: Option<&'a str>,
}

impl<'a> AnalysisUnit<'a> {
    /// Expand habit definitions into analysis units, preserving definition order.
    ///
    /// A select habit without options produces no units.
    pub fn expand(habits: &'a [HabitDefinition]) -> Vec<AnalysisUnit<'a>> {
        habits
            .iter()
            .flat_map(|habit| -> Vec<AnalysisUnit<'a>> {
                match habit.habit_type {
                    HabitType::Select => habit
                        .options
                        .iter()
                        .map(|option| AnalysisUnit {
                            habit,
                            option: Some(option.as_str()),
                        })
                        .collect(),
                    _ => vec![AnalysisUnit {
                        habit,
                        option: None,
                    }],
                }
            })
            .collect()
    }

    /// Whether the habit counts as present on this day
    pub fn is_present(&self, entry: &Entry) -> bool {
        match self.option {
            Some(option) => entry
                .habit_value(&self.habit.id)
                .and_then(HabitValue::as_select)
                .is_some_and(|value| value == option),
            None => entry.has_habit(&self.habit.id),
        }
    }

    pub fn label(&self) -> String {
        match self.option {
            Some(option) => format!("{}: {}", self.habit.label, option),
            None => self.habit.label.clone(),
        }
    }

    fn supports_median_split(&self) -> bool {
        matches!(self.habit.habit_type, HabitType::Number | HabitType::Time)
    }
}

/// Habit impact analyzer for a single metric
pub struct ImpactAnalyzer<'a> {
    config: &'a AnalyzerConfig,
    metric: Metric,
}

impl<'a> ImpactAnalyzer<'a> {
    pub fn new(config: &'a AnalyzerConfig, metric: Metric) -> Self {
        Self { config, metric }
    }

    /// Compute ranked impact rows for every habit
    pub fn analyze(&self, entries: &[Entry], habits: &[HabitDefinition]) -> Vec<ImpactRow> {
        let mut rows: Vec<ImpactRow> = AnalysisUnit::expand(habits)
            .iter()
            .filter_map(|unit| self.analyze_unit(unit, entries))
            .collect();
        rank_rows(&mut rows);
        rows
    }

    /// Analyze one unit, `None` when neither group has any entries
    pub fn analyze_unit(&self, unit: &AnalysisUnit<'_>, entries: &[Entry]) -> Option<ImpactRow> {
        let (present, absent): (Vec<&Entry>, Vec<&Entry>) =
            entries.iter().partition(|entry| unit.is_present(entry));

        if present.is_empty() && absent.is_empty() {
            return None;
        }

        let present_mean = mean_metric(&present, self.metric);
        let absent_mean = mean_metric(&absent, self.metric);

        let (strategy, impact, label_detail) = match (present_mean, absent_mean) {
            (Some(with), Some(without)) => (ImpactStrategy::PresenceAbsence, Some(with - without), None),
            (_, None) if unit.supports_median_split() => match self.median_split(unit, &present) {
                Some(impact) => (
                    ImpactStrategy::MedianSplit,
                    Some(impact),
                    Some(median_split_label(unit.habit.habit_type).to_string()),
                ),
                None => (ImpactStrategy::Unavailable, None, None),
            },
            _ => (ImpactStrategy::Unavailable, None, None),
        };

        let significant =
            strategy != ImpactStrategy::Unavailable && present.len() >= self.config.min_sample_size;

        tracing::trace!(
            habit = %unit.habit.id,
            option = unit.option.unwrap_or(""),
            present = present.len(),
            absent = absent.len(),
            ?strategy,
            significant,
            "Habit impact"
        );

        let avg_value = match unit.habit.habit_type {
            HabitType::Number => mean(present.iter().filter_map(|entry| {
                entry
                    .habit_value(&unit.habit.id)
                    .and_then(HabitValue::as_number)
            })),
            _ => None,
        };

        Some(ImpactRow {
            habit_id: unit.habit.id.clone(),
            label: unit.label(),
            habit_type: unit.habit.habit_type,
            option: unit.option.map(str::to_string),
            label_detail,
            strategy,
            impact,
            avg_metric: present_mean,
            avg_value,
            present_count: present.len(),
            absent_count: absent.len(),
            significant,
            effect: ImpactEffect::classify(impact, self.metric.inverse()),
        })
    }

    /// Upper-half mean minus lower-half mean over days with a recorded value
    fn median_split(&self, unit: &AnalysisUnit<'_>, present: &[&Entry]) -> Option<f64> {
        let mut valued: Vec<(f64, &Entry)> = present
            .iter()
            .filter_map(|entry| {
                let value = entry.habit_value(&unit.habit.id)?;
                self.split_value(value).map(|v| (v, *entry))
            })
            .collect();

        if valued.len() < self.config.median_split_min_values {
            return None;
        }

        valued.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mid = valued.len() / 2;
        let (low, high) = valued.split_at(mid + 1);
        if high.is_empty() {
            return None;
        }

        let low_mean = mean(low.iter().filter_map(|(_, e)| e.metric(self.metric)))?;
        let high_mean = mean(high.iter().filter_map(|(_, e)| e.metric(self.metric)))?;
        Some(high_mean - low_mean)
    }

    /// Sort key for a recorded value; times before the cutoff count as after midnight
    fn split_value(&self, value: &HabitValue) -> Option<f64> {
        match value {
            HabitValue::Number(n) => Some(*n),
            HabitValue::Time(t) if t.hour < self.config.late_night_cutoff_hour => {
                Some(t.decimal_hours() + 24.0)
            }
            HabitValue::Time(t) => Some(t.decimal_hours()),
            _ => None,
        }
    }
}

fn median_split_label(habit_type: HabitType) -> &'static str {
    match habit_type {
        HabitType::Time => "(Late vs Early)",
        _ => "(High vs Low)",
    }
}

/// Significant rows first, then by descending `|impact|` (rows without one last).
///
/// The sort is stable, so equal rows keep habit definition order.
pub fn rank_rows(rows: &mut [ImpactRow]) {
    rows.sort_by(|a, b| {
        b.significant
            .cmp(&a.significant)
            .then_with(|| compare_magnitude(a.impact, b.impact))
    });
}

fn compare_magnitude(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.abs().total_cmp(&a.abs()),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Mean of the metric over the entries that carry it
pub fn mean_metric(entries: &[&Entry], metric: Metric) -> Option<f64> {
    mean(entries.iter().filter_map(|entry| entry.metric(metric)))
}

/// Arithmetic mean, `None` for an empty input
pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}
